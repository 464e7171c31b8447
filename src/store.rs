//! Backing stores for array elements

use std::fmt::{self, Debug, Formatter};
use std::iter::FusedIterator;
use std::mem;

use hashbrown::HashMap;

use crate::alloc::{try_grow_for, try_with_capacity, AllocError};
use crate::error::{ElementsError, Result};
use crate::kind::ElementsKind;
use crate::value::Value;

/// Physical element buffers, one layout per kind. `None` slots are holes.
enum Elements {
    Smi(Vec<Option<i32>>),
    Double(Vec<Option<f64>>),
    Generic(Vec<Option<Value>>),
    Dictionary {
        map: HashMap<usize, Value>,
        length: usize,
    },
}

impl Default for Elements {
    fn default() -> Self {
        Elements::Smi(Vec::new())
    }
}

impl Elements {
    fn empty(kind: ElementsKind) -> Self {
        match kind {
            ElementsKind::PackedSmi => Elements::Smi(Vec::new()),
            ElementsKind::PackedDouble => Elements::Double(Vec::new()),
            ElementsKind::Packed => Elements::Generic(Vec::new()),
            ElementsKind::Dictionary => Elements::Dictionary {
                map: HashMap::new(),
                length: 0,
            },
        }
    }

    fn kind(&self) -> ElementsKind {
        match self {
            Elements::Smi(_) => ElementsKind::PackedSmi,
            Elements::Double(_) => ElementsKind::PackedDouble,
            Elements::Generic(_) => ElementsKind::Packed,
            Elements::Dictionary { .. } => ElementsKind::Dictionary,
        }
    }

    fn with_capacity(kind: ElementsKind, cap: usize) -> Result<Self, AllocError> {
        Ok(match kind {
            ElementsKind::PackedSmi => Elements::Smi(try_with_capacity(cap)?),
            ElementsKind::PackedDouble => Elements::Double(try_with_capacity(cap)?),
            ElementsKind::Packed => Elements::Generic(try_with_capacity(cap)?),
            ElementsKind::Dictionary => {
                let mut map = HashMap::new();
                map.try_reserve(cap)?;
                Elements::Dictionary { map, length: 0 }
            }
        })
    }

    fn len(&self) -> usize {
        match self {
            Elements::Smi(buf) => buf.len(),
            Elements::Double(buf) => buf.len(),
            Elements::Generic(buf) => buf.len(),
            Elements::Dictionary { length, .. } => *length,
        }
    }

    fn capacity(&self) -> usize {
        match self {
            Elements::Smi(buf) => buf.capacity(),
            Elements::Double(buf) => buf.capacity(),
            Elements::Generic(buf) => buf.capacity(),
            Elements::Dictionary { length, .. } => *length,
        }
    }

    /// Re-encodes `self` for `kind`, which must be strictly more general.
    /// The target buffer is allocated before the source is consumed, so on
    /// failure the source is handed back untouched.
    fn reencode(self, kind: ElementsKind, occupied: usize) -> Result<Self, (Self, AllocError)> {
        if kind.is_dictionary() {
            let mut map = HashMap::new();
            if let Err(e) = map.try_reserve(occupied) {
                return Err((self, e.into()));
            }
            let length = self.len();
            match self {
                Elements::Smi(buf) => map.extend(occupied_slots(buf, Value::from)),
                Elements::Double(buf) => map.extend(occupied_slots(buf, Value::Number)),
                Elements::Generic(buf) => map.extend(occupied_slots(buf, |v| v)),
                Elements::Dictionary { .. } => unreachable!("dictionary is not widened"),
            }
            return Ok(Elements::Dictionary { map, length });
        }

        let cap = self.capacity();
        match (self, kind) {
            (Elements::Smi(buf), ElementsKind::PackedDouble) => match try_with_capacity(cap) {
                Ok(mut out) => {
                    out.extend(buf.into_iter().map(|s| s.map(f64::from)));
                    Ok(Elements::Double(out))
                }
                Err(e) => Err((Elements::Smi(buf), e)),
            },
            (Elements::Smi(buf), ElementsKind::Packed) => match try_with_capacity(cap) {
                Ok(mut out) => {
                    out.extend(buf.into_iter().map(|s| s.map(Value::from)));
                    Ok(Elements::Generic(out))
                }
                Err(e) => Err((Elements::Smi(buf), e)),
            },
            (Elements::Double(buf), ElementsKind::Packed) => match try_with_capacity(cap) {
                Ok(mut out) => {
                    out.extend(buf.into_iter().map(|d| d.map(Value::Number)));
                    Ok(Elements::Generic(out))
                }
                Err(e) => Err((Elements::Double(buf), e)),
            },
            (from, to) => unreachable!("no re-encoding from {:?} to {:?}", from.kind(), to),
        }
    }
}

fn occupied_slots<T, F>(buf: Vec<Option<T>>, f: F) -> impl Iterator<Item = (usize, Value)>
where
    F: Fn(T) -> Value,
{
    buf.into_iter()
        .enumerate()
        .filter_map(move |(i, slot)| slot.map(|x| (i, f(x))))
}

/// Writes `slot` into `buf[index]`, growing and padding with holes as
/// needed. Returns `true` if the slot was a hole.
fn write_slot<T>(buf: &mut Vec<Option<T>>, index: usize, slot: T) -> Result<bool, AllocError> {
    if index >= buf.len() {
        try_grow_for(buf, index)?;
        buf.resize_with(index + 1, || None);
    }
    Ok(buf[index].replace(slot).is_none())
}

fn encode_mismatch(kind: ElementsKind, value: &Value) -> ! {
    panic!(
        "a {} value does not fit {}; widen the store before writing",
        value.type_name(),
        kind
    )
}

/// An exclusively-owned element buffer laid out for one [`ElementsKind`].
///
/// `set` does not check kinds: writing a value that does not fit the current
/// layout is a contract violation and panics. Go through
/// [`TransitionEngine`](crate::TransitionEngine) to get widening.
pub struct BackingStore {
    elements: Elements,
    occupied: usize,
}

impl BackingStore {
    /// Creates an empty store laid out for `kind`. Does not allocate.
    #[must_use]
    pub fn new(kind: ElementsKind) -> Self {
        Self {
            elements: Elements::empty(kind),
            occupied: 0,
        }
    }

    /// Creates an empty store laid out for `kind` with room for
    /// `initial_capacity` elements.
    pub fn create(kind: ElementsKind, initial_capacity: usize) -> Result<Self> {
        Ok(Self {
            elements: Elements::with_capacity(kind, initial_capacity)?,
            occupied: 0,
        })
    }

    /// Current layout.
    #[must_use]
    pub fn kind(&self) -> ElementsKind {
        self.elements.kind()
    }

    /// Number of slots, holes included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the store has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots that can be held without reallocating. A dictionary
    /// has no slots, so its capacity is its length.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.elements.capacity()
    }

    /// Number of slots that are not holes.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    /// Returns `true` if `index` is a hole or past the end.
    #[must_use]
    pub fn is_hole(&self, index: usize) -> bool {
        match &self.elements {
            Elements::Smi(buf) => buf.get(index).map_or(true, Option::is_none),
            Elements::Double(buf) => buf.get(index).map_or(true, Option::is_none),
            Elements::Generic(buf) => buf.get(index).map_or(true, Option::is_none),
            Elements::Dictionary { map, .. } => !map.contains_key(&index),
        }
    }

    /// Reads slot `index`. Holes read as `Undefined`.
    pub fn get(&self, index: usize) -> Result<Value> {
        let length = self.len();
        if index >= length {
            return Err(ElementsError::IndexOutOfRange { index, length });
        }
        Ok(self.slot(index))
    }

    // Safety of indexing: caller checked `index < len`
    fn slot(&self, index: usize) -> Value {
        match &self.elements {
            Elements::Smi(buf) => buf[index].map_or(Value::Undefined, Value::from),
            Elements::Double(buf) => buf[index].map_or(Value::Undefined, Value::Number),
            Elements::Generic(buf) => buf[index].clone().unwrap_or_default(),
            Elements::Dictionary { map, .. } => map.get(&index).cloned().unwrap_or_default(),
        }
    }

    /// Writes slot `index` without kind checking. Writing past the end grows
    /// the store and leaves holes in between. If the store cannot grow to
    /// `index + 1` slots, `ResourceExhausted` is returned and the store is
    /// unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `value` does not fit the current layout.
    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        let was_hole = match &mut self.elements {
            Elements::Smi(buf) => match value.as_small_int() {
                Some(s) => write_slot(buf, index, s)?,
                None => encode_mismatch(ElementsKind::PackedSmi, &value),
            },
            Elements::Double(buf) => match value.as_number() {
                Some(d) => write_slot(buf, index, d)?,
                None => encode_mismatch(ElementsKind::PackedDouble, &value),
            },
            Elements::Generic(buf) => write_slot(buf, index, value)?,
            Elements::Dictionary { map, length } => {
                let new_length = index.checked_add(1).ok_or(AllocError)?;
                map.try_reserve(1).map_err(AllocError::from)?;
                *length = (*length).max(new_length);
                map.insert(index, value).is_none()
            }
        };
        if was_hole {
            self.occupied += 1;
        }
        Ok(())
    }

    /// Re-encodes every slot for `new_kind`. The old buffer is consumed and
    /// replaced; if the new buffer cannot be allocated the store is left
    /// unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `new_kind` is less general than the current kind.
    pub fn convert_to(&mut self, new_kind: ElementsKind) -> Result<()> {
        let kind = self.kind();
        assert!(
            new_kind >= kind,
            "invalid elements transition from {:?} to {:?}",
            kind,
            new_kind
        );
        if new_kind == kind {
            return Ok(());
        }
        let old = mem::take(&mut self.elements);
        match old.reencode(new_kind, self.occupied) {
            Ok(new) => {
                self.elements = new;
                Ok(())
            }
            Err((old, e)) => {
                self.elements = old;
                Err(e.into())
            }
        }
    }

    /// Removes and returns the last slot, or `None` if the store is empty.
    pub fn pop(&mut self) -> Option<Value> {
        let last = self.len().checked_sub(1)?;
        let value = self.slot(last);
        if !self.is_hole(last) {
            self.occupied -= 1;
        }
        match &mut self.elements {
            Elements::Smi(buf) => {
                buf.pop();
            }
            Elements::Double(buf) => {
                buf.pop();
            }
            Elements::Generic(buf) => {
                buf.pop();
            }
            Elements::Dictionary { map, length } => {
                map.remove(&last);
                *length = last;
            }
        }
        Some(value)
    }

    /// Shortens the store to `len` slots. The kind and capacity are unchanged.
    pub fn truncate(&mut self, len: usize) {
        while self.len() > len {
            self.pop();
        }
    }

    /// Iterates over all slots in index order, holes as `Undefined`.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            store: self,
            index: 0,
        }
    }
}

impl Debug for BackingStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingStore")
            .field("kind", &self.kind())
            .field("length", &self.len())
            .field("occupied", &self.occupied)
            .finish()
    }
}

/// Iterator over the slots of a [`BackingStore`]
#[derive(Debug)]
pub struct Iter<'a> {
    store: &'a BackingStore,
    index: usize,
}

impl Iterator for Iter<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index < self.store.len() {
            let value = self.store.slot(self.index);
            self.index += 1;
            Some(value)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }
}

impl ExactSizeIterator for Iter<'_> {
    fn len(&self) -> usize {
        self.store.len() - self.index
    }
}

impl FusedIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a BackingStore {
    type Item = Value;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
