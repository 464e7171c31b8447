//! Fixed external numeric buffers
//!
//! These buffers have one element type for their whole lifetime and a fixed
//! length. Stores coerce the incoming value to the element type; they never
//! trigger a transition.

use std::fmt::{self, Debug, Formatter};

use crate::alloc::{try_with_capacity, AllocError};
use crate::error::{ElementsError, Result};
use crate::kind::ExternalArrayType;
use crate::value::Value;

/// A fixed-length buffer of one numeric element type
#[derive(Clone, PartialEq)]
pub enum ExternalElements {
    /// Signed 8-bit integers
    Int8(Vec<i8>),
    /// Unsigned 8-bit integers
    Uint8(Vec<u8>),
    /// Signed 16-bit integers
    Int16(Vec<i16>),
    /// Unsigned 16-bit integers
    Uint16(Vec<u16>),
    /// Signed 32-bit integers
    Int32(Vec<i32>),
    /// Unsigned 32-bit integers
    Uint32(Vec<u32>),
    /// 32-bit floats
    Float32(Vec<f32>),
    /// 64-bit floats
    Float64(Vec<f64>),
    /// Clamped unsigned 8-bit integers
    Pixel(Vec<u8>),
}

macro_rules! each_buffer {
    ($self:expr, $buf:ident => $body:expr) => {
        match $self {
            ExternalElements::Int8($buf) => $body,
            ExternalElements::Uint8($buf) => $body,
            ExternalElements::Int16($buf) => $body,
            ExternalElements::Uint16($buf) => $body,
            ExternalElements::Int32($buf) => $body,
            ExternalElements::Uint32($buf) => $body,
            ExternalElements::Float32($buf) => $body,
            ExternalElements::Float64($buf) => $body,
            ExternalElements::Pixel($buf) => $body,
        }
    };
}

fn zeroed<T: Default + Clone>(len: usize) -> Result<Vec<T>, AllocError> {
    let mut buf = try_with_capacity(len)?;
    buf.resize(len, T::default());
    Ok(buf)
}

/// Integer conversion modulo 2^32.
fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// Clamps to 0..=255, rounding halves to even.
fn to_pixel(n: f64) -> u8 {
    if n.is_nan() || n <= 0.0 {
        return 0;
    }
    if n >= 255.0 {
        return 255;
    }
    let floor = n.floor();
    let diff = n - floor;
    let rounded = if diff > 0.5 || (diff == 0.5 && floor % 2.0 != 0.0) {
        floor + 1.0
    } else {
        floor
    };
    rounded as u8
}

impl ExternalElements {
    /// Allocates a zero-filled buffer of `length` elements.
    pub fn new(ty: ExternalArrayType, length: usize) -> Result<Self> {
        use ExternalArrayType as T;
        Ok(match ty {
            T::Int8 => Self::Int8(zeroed(length)?),
            T::Uint8 => Self::Uint8(zeroed(length)?),
            T::Int16 => Self::Int16(zeroed(length)?),
            T::Uint16 => Self::Uint16(zeroed(length)?),
            T::Int32 => Self::Int32(zeroed(length)?),
            T::Uint32 => Self::Uint32(zeroed(length)?),
            T::Float32 => Self::Float32(zeroed(length)?),
            T::Float64 => Self::Float64(zeroed(length)?),
            T::Pixel => Self::Pixel(zeroed(length)?),
        })
    }

    /// Element type of this buffer.
    #[must_use]
    pub fn array_type(&self) -> ExternalArrayType {
        use ExternalArrayType as T;
        match self {
            Self::Int8(_) => T::Int8,
            Self::Uint8(_) => T::Uint8,
            Self::Int16(_) => T::Int16,
            Self::Uint16(_) => T::Uint16,
            Self::Int32(_) => T::Int32,
            Self::Uint32(_) => T::Uint32,
            Self::Float32(_) => T::Float32,
            Self::Float64(_) => T::Float64,
            Self::Pixel(_) => T::Pixel,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        each_buffer!(self, buf => buf.len())
    }

    /// Returns `true` if the buffer has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads element `index` as a number.
    pub fn get(&self, index: usize) -> Result<Value> {
        let length = self.len();
        if index >= length {
            return Err(ElementsError::IndexOutOfRange { index, length });
        }
        let n = match self {
            Self::Int8(buf) => f64::from(buf[index]),
            Self::Uint8(buf) | Self::Pixel(buf) => f64::from(buf[index]),
            Self::Int16(buf) => f64::from(buf[index]),
            Self::Uint16(buf) => f64::from(buf[index]),
            Self::Int32(buf) => f64::from(buf[index]),
            Self::Uint32(buf) => f64::from(buf[index]),
            Self::Float32(buf) => f64::from(buf[index]),
            Self::Float64(buf) => buf[index],
        };
        Ok(Value::Number(n))
    }

    /// Coerces `value` to the element type and writes it. Writes past the
    /// end are ignored; returns whether the write happened.
    pub fn set(&mut self, index: usize, value: &Value) -> bool {
        if index >= self.len() {
            return false;
        }
        let n = value.to_number();
        match self {
            Self::Int8(buf) => buf[index] = to_uint32(n) as u8 as i8,
            Self::Uint8(buf) => buf[index] = to_uint32(n) as u8,
            Self::Int16(buf) => buf[index] = to_uint32(n) as u16 as i16,
            Self::Uint16(buf) => buf[index] = to_uint32(n) as u16,
            Self::Int32(buf) => buf[index] = to_uint32(n) as i32,
            Self::Uint32(buf) => buf[index] = to_uint32(n),
            Self::Float32(buf) => buf[index] = n as f32,
            Self::Float64(buf) => buf[index] = n,
            Self::Pixel(buf) => buf[index] = to_pixel(n),
        }
        true
    }
}

impl Debug for ExternalElements {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        each_buffer!(self, buf => f
            .debug_tuple(self.array_type().label())
            .field(buf)
            .finish())
    }
}
