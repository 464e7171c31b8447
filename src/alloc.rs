//! Module for fallible allocation

use std::collections::TryReserveError;
use std::error::Error;
use std::fmt;

/// Error type for fallible allocation
/// This error is returned when growing or re-encoding an element buffer fails.
/// It does not contain any additional information.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct AllocError;

impl Error for AllocError {}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl From<TryReserveError> for AllocError {
    fn from(_: TryReserveError) -> Self {
        AllocError
    }
}

impl From<hashbrown::TryReserveError> for AllocError {
    fn from(_: hashbrown::TryReserveError) -> Self {
        AllocError
    }
}

/// Allocates an empty buffer able to hold `cap` items without reallocating.
pub(crate) fn try_with_capacity<T>(cap: usize) -> Result<Vec<T>, AllocError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(cap)?;
    Ok(buf)
}

/// Makes room for index `index` in `buf`, growing geometrically.
pub(crate) fn try_grow_for<T>(buf: &mut Vec<T>, index: usize) -> Result<(), AllocError> {
    let desired = index.checked_add(1).ok_or(AllocError)?;
    let current = buf.capacity();
    if current >= desired {
        return Ok(());
    }
    let new_cap = std::cmp::max(current.saturating_mul(2), desired.max(4));
    buf.try_reserve_exact(new_cap - buf.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_geometrically() {
        let mut buf: Vec<u8> = try_with_capacity(2).unwrap();
        assert!(buf.capacity() >= 2);
        try_grow_for(&mut buf, 2).unwrap();
        assert!(buf.capacity() >= 4);
        try_grow_for(&mut buf, 100).unwrap();
        assert!(buf.capacity() >= 101);
    }

    #[test]
    fn huge_request_is_an_error() {
        let mut buf: Vec<u64> = Vec::new();
        assert_eq!(try_grow_for(&mut buf, usize::MAX), Err(AllocError));
        assert_eq!(try_grow_for(&mut buf, usize::MAX / 2), Err(AllocError));
    }
}
