//! Array objects and the classification query

use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::error::Result;
use crate::external::ExternalElements;
use crate::kind::{ArrayKind, ElementsKind, ExternalArrayType};
use crate::site::SiteId;
use crate::store::BackingStore;
use crate::value::{ArrayRef, Value};

/// Element storage of an array: either a transitionable store or a fixed
/// external buffer.
#[derive(Debug)]
pub(crate) enum ArrayElements {
    Store(BackingStore),
    External(ExternalElements),
}

/// An array object: its elements plus the allocation site it came from, if
/// it was created by a literal.
///
/// Reads and pops are available directly. Stores that may need to widen the
/// elements go through [`TransitionEngine`](crate::TransitionEngine).
pub struct ArrayObject {
    elements: ArrayElements,
    site: Option<SiteId>,
}

impl ArrayObject {
    /// Creates an empty array laid out for `kind`.
    pub fn with_kind(kind: ElementsKind, capacity: usize) -> Result<Self> {
        Ok(Self::from_store(BackingStore::create(kind, capacity)?, None))
    }

    /// Creates a zero-filled external numeric array of `length` elements.
    pub fn external(ty: ExternalArrayType, length: usize) -> Result<Self> {
        Ok(Self {
            elements: ArrayElements::External(ExternalElements::new(ty, length)?),
            site: None,
        })
    }

    pub(crate) fn from_store(store: BackingStore, site: Option<SiteId>) -> Self {
        Self {
            elements: ArrayElements::Store(store),
            site,
        }
    }

    /// Wraps the array in a shared handle.
    #[must_use]
    pub fn into_ref(self) -> ArrayRef {
        Rc::new(RefCell::new(self))
    }

    /// Current representation.
    #[must_use]
    pub fn kind(&self) -> ArrayKind {
        match &self.elements {
            ArrayElements::Store(store) => ArrayKind::Elements(store.kind()),
            ArrayElements::External(buf) => ArrayKind::External(buf.array_type()),
        }
    }

    /// Current representation as a human-readable label, e.g.
    /// `"packed small-int elements"`.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        self.kind().label()
    }

    /// The transitionable kind, or `None` for external arrays.
    #[must_use]
    pub fn elements_kind(&self) -> Option<ElementsKind> {
        match self.kind() {
            ArrayKind::Elements(kind) => Some(kind),
            ArrayKind::External(_) => None,
        }
    }

    /// The allocation site this array was created at.
    #[must_use]
    pub fn site(&self) -> Option<SiteId> {
        self.site
    }

    /// Number of elements, holes included.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.elements {
            ArrayElements::Store(store) => store.len(),
            ArrayElements::External(buf) => buf.len(),
        }
    }

    /// Returns `true` if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads element `index`; fails past the end.
    pub fn get(&self, index: usize) -> Result<Value> {
        match &self.elements {
            ArrayElements::Store(store) => store.get(index),
            ArrayElements::External(buf) => buf.get(index),
        }
    }

    /// Removes and returns the last element. The kind is never narrowed.
    /// External arrays have a fixed length and return `None`.
    pub fn pop(&mut self) -> Option<Value> {
        match &mut self.elements {
            ArrayElements::Store(store) => store.pop(),
            ArrayElements::External(_) => None,
        }
    }

    /// Copies out all elements, holes as `Undefined`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        (0..self.len())
            .map(|i| self.get(i).unwrap_or_default())
            .collect()
    }

    /// The transitionable store, if this is not an external array.
    #[must_use]
    pub fn backing_store(&self) -> Option<&BackingStore> {
        match &self.elements {
            ArrayElements::Store(store) => Some(store),
            ArrayElements::External(_) => None,
        }
    }

    pub(crate) fn elements_mut(&mut self) -> &mut ArrayElements {
        &mut self.elements
    }
}

impl Default for ArrayObject {
    fn default() -> Self {
        Self::from_store(BackingStore::new(ElementsKind::PackedSmi), None)
    }
}

impl Debug for ArrayObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayObject")
            .field("kind", &self.kind_label())
            .field("site", &self.site)
            .field("elements", &self.to_vec())
            .finish()
    }
}

impl Serialize for ArrayObject {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for value in self.to_vec() {
            seq.serialize_element(&value)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElementsConfig;
    use crate::engine::TransitionEngine;
    use crate::site::SiteTable;

    #[test]
    fn classification_labels() {
        let array = ArrayObject::default();
        assert_eq!(array.kind_label(), "packed small-int elements");
        assert_eq!(array.elements_kind(), Some(ElementsKind::PackedSmi));

        let array = ArrayObject::with_kind(ElementsKind::PackedDouble, 4).unwrap();
        assert_eq!(array.kind_label(), "packed double elements");

        let array = ArrayObject::external(ExternalArrayType::Uint16, 4).unwrap();
        assert_eq!(array.kind_label(), "external unsigned short elements");
        assert_eq!(array.elements_kind(), None);
        assert!(array.backing_store().is_none());
    }

    #[test]
    fn external_arrays_have_fixed_length() {
        let mut array = ArrayObject::external(ExternalArrayType::Float32, 2).unwrap();
        assert_eq!(array.pop(), None);
        assert_eq!(array.len(), 2);
        assert_eq!(array.get(1).unwrap(), Value::from(0));
    }

    #[test]
    fn nested_arrays_serialize() {
        let inner = ArrayObject::default().into_ref();
        let mut store = BackingStore::create(ElementsKind::Packed, 2).unwrap();
        store.set(0, Value::from("a")).unwrap();
        store.set(1, Value::Array(inner)).unwrap();
        let outer = ArrayObject::from_store(store, None);
        assert_eq!(serde_json::to_string(&outer).unwrap(), r#"["a",[]]"#);
    }

    #[test]
    fn self_containing_array() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let array = ArrayObject::default().into_ref();
        engine.push(&mut array.borrow_mut(), Value::from(1)).unwrap();
        engine
            .store(&mut array.borrow_mut(), 0, Value::Array(array.clone()))
            .unwrap();
        assert_eq!(array.borrow().elements_kind(), Some(ElementsKind::Packed));

        let text = format!("{:?}", array.borrow());
        assert!(text.contains("[<cyclic>]"), "{}", text);
        let err = serde_json::to_string(&*array.borrow()).unwrap_err();
        assert!(err.to_string().contains("cyclic array"), "{}", err);

        // Break the cycle so the array is freed.
        engine
            .store(&mut array.borrow_mut(), 0, Value::Null)
            .unwrap();
    }

    #[test]
    fn shared_arrays_are_not_cycles() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let inner = ArrayObject::default().into_ref();
        let mut outer = engine.new_array();
        engine.push(&mut outer, Value::Array(inner.clone())).unwrap();
        engine.push(&mut outer, Value::Array(inner)).unwrap();
        assert_eq!(serde_json::to_string(&outer).unwrap(), "[[],[]]");
        assert!(!format!("{:?}", outer).contains("cyclic"));
    }
}
