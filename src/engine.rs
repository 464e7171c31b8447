//! The indexed-store path and its transitions
//!
//! Every store computes the kind the incoming value needs. If the array's
//! store is less general, it is widened to the join of the two before the
//! write. Independently, a write that would leave a packed store too sparse
//! normalizes it to a dictionary first. Neither transition is ever undone.
//!
//! When a widening happens on an array that came from an array literal, the
//! literal's allocation site is raised to the widened kind, so that the next
//! array built from that literal starts out wide enough.

use tracing::debug;

use crate::alloc::AllocError;
use crate::array::{ArrayElements, ArrayObject};
use crate::config::ElementsConfig;
use crate::error::Result;
use crate::kind::ElementsKind;
use crate::site::{SiteFeedback, SiteId};
use crate::value::Value;

/// What a store did besides writing the value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreOutcome {
    /// Kind the store was widened to, if it was widened
    pub widened_to: Option<ElementsKind>,
    /// Whether the store was normalized to a dictionary
    pub normalized: bool,
    /// Whether the array's allocation site learned a wider kind
    pub feedback_committed: bool,
}

impl StoreOutcome {
    /// Returns `true` if the store wrote in place without any transition.
    #[must_use]
    pub fn is_in_place(&self) -> bool {
        self.widened_to.is_none() && !self.normalized
    }
}

/// Performs element stores, widening and normalizing stores as needed and
/// committing allocation-site feedback.
pub struct TransitionEngine<'a> {
    config: &'a ElementsConfig,
    sites: &'a dyn SiteFeedback,
}

impl<'a> TransitionEngine<'a> {
    /// Creates an engine over `sites`.
    pub fn new(config: &'a ElementsConfig, sites: &'a dyn SiteFeedback) -> Self {
        Self { config, sites }
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &ElementsConfig {
        self.config
    }

    /// Creates an empty array that did not come from a literal.
    #[must_use]
    pub fn new_array(&self) -> ArrayObject {
        ArrayObject::from_store(crate::store::BackingStore::new(self.config.initial_kind()), None)
    }

    /// Stores `value` at `index`.
    ///
    /// External arrays coerce the value and never transition; stores past
    /// their end are ignored.
    ///
    /// An index whose length would not fit in `usize` is rejected with
    /// `ResourceExhausted` before any transition. If growing the store fails
    /// after a widening has already happened, the array stays widened and its
    /// site has already learned the wider kind.
    pub fn store(&self, array: &mut ArrayObject, index: usize, value: Value) -> Result<StoreOutcome> {
        let site = array.site();
        let store = match array.elements_mut() {
            ArrayElements::Store(store) => store,
            ArrayElements::External(buf) => {
                buf.set(index, &value);
                return Ok(StoreOutcome::default());
            }
        };

        index.checked_add(1).ok_or(AllocError)?;

        let mut outcome = StoreOutcome::default();
        let kind = store.kind();
        let target = kind.join(self.config.classify(&value));
        if target != kind {
            store.convert_to(target)?;
            debug!(from = ?kind, to = ?target, index, "elements: widened");
            outcome.widened_to = Some(target);
            if let Some(site) = site {
                outcome.feedback_committed = self.commit_feedback(site, target);
            }
        }

        if target.is_packed() {
            let occupied_after = store.occupied() + usize::from(store.is_hole(index));
            if self.config.sparse.should_normalize(index, store.len(), occupied_after) {
                store.convert_to(ElementsKind::Dictionary)?;
                debug!(
                    from = ?target,
                    index,
                    length = store.len(),
                    "elements: normalized to dictionary"
                );
                outcome.normalized = true;
            }
        }

        store.set(index, value)?;
        Ok(outcome)
    }

    /// Appends `value`, widening as needed.
    pub fn push(&self, array: &mut ArrayObject, value: Value) -> Result<StoreOutcome> {
        let index = array.len();
        self.store(array, index, value)
    }

    fn commit_feedback(&self, site: SiteId, kind: ElementsKind) -> bool {
        if !self.config.allocation_site_feedback {
            return false;
        }
        let raised = self.sites.raise(site, kind);
        if raised {
            debug!(site = %site, kind = ?kind, "allocation site: feedback committed");
        }
        raised
    }
}

impl std::fmt::Debug for TransitionEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionEngine")
            .field("config", self.config)
            .field("sites", &self.sites.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SparsePolicy;
    use crate::error::ElementsError;
    use crate::kind::ExternalArrayType;
    use crate::site::SiteTable;
    use crate::store::BackingStore;

    const SITE: SiteId = SiteId::new(3, 7);

    fn literal_array(values: &[i32], site: Option<SiteId>) -> ArrayObject {
        let mut store = BackingStore::create(ElementsKind::PackedSmi, values.len()).unwrap();
        for (i, &v) in values.iter().enumerate() {
            store.set(i, Value::from(v)).unwrap();
        }
        ArrayObject::from_store(store, site)
    }

    #[test]
    fn small_int_stores_stay_in_place() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = literal_array(&[1, 2, 3], Some(SITE));
        let outcome = engine.store(&mut array, 0, Value::from(1)).unwrap();
        assert!(outcome.is_in_place());
        assert_eq!(array.elements_kind(), Some(ElementsKind::PackedSmi));
        assert_eq!(sites.remembered_kind(SITE), None);
    }

    #[test]
    fn double_widens_and_commits_feedback() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = literal_array(&[1, 2, 3], Some(SITE));
        let outcome = engine.store(&mut array, 0, Value::from(1.5)).unwrap();
        assert_eq!(outcome.widened_to, Some(ElementsKind::PackedDouble));
        assert!(outcome.feedback_committed);
        assert_eq!(array.elements_kind(), Some(ElementsKind::PackedDouble));
        assert_eq!(array.to_vec(), vec![Value::from(1.5), Value::from(2), Value::from(3)]);
        assert_eq!(sites.remembered_kind(SITE), Some(ElementsKind::PackedDouble));
    }

    #[test]
    fn generic_pins_the_array() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = literal_array(&[1, 2, 3, 4], None);
        engine.store(&mut array, 0, Value::from("text")).unwrap();
        assert_eq!(array.elements_kind(), Some(ElementsKind::Packed));
        let outcome = engine.store(&mut array, 0, Value::from(2)).unwrap();
        assert!(outcome.is_in_place());
        array.pop();
        assert_eq!(array.elements_kind(), Some(ElementsKind::Packed));
    }

    #[test]
    fn arrays_without_a_site_commit_nothing() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = engine.new_array();
        let outcome = engine.push(&mut array, Value::from(0.25)).unwrap();
        assert_eq!(outcome.widened_to, Some(ElementsKind::PackedDouble));
        assert!(!outcome.feedback_committed);
        assert!(sites.is_empty());
    }

    #[test]
    fn feedback_can_be_disabled() {
        let config = ElementsConfig {
            allocation_site_feedback: false,
            ..ElementsConfig::default()
        };
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = literal_array(&[1], Some(SITE));
        engine.store(&mut array, 0, Value::from("x")).unwrap();
        assert_eq!(array.elements_kind(), Some(ElementsKind::Packed));
        assert_eq!(sites.remembered_kind(SITE), None);
    }

    #[test]
    fn far_store_normalizes() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = literal_array(&[1, 2, 3], None);
        let outcome = engine.store(&mut array, 5000, Value::from(4)).unwrap();
        assert!(outcome.normalized);
        assert_eq!(outcome.widened_to, None);
        assert_eq!(array.kind_label(), "dictionary elements");
        assert_eq!(array.len(), 5001);

        for i in 3..10 {
            engine.store(&mut array, i, Value::from(1)).unwrap();
        }
        assert_eq!(array.elements_kind(), Some(ElementsKind::Dictionary));
    }

    #[test]
    fn widening_and_normalizing_in_one_store() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = literal_array(&[1, 2, 3], Some(SITE));
        let outcome = engine.store(&mut array, 10_000, Value::from(0.5)).unwrap();
        assert_eq!(outcome.widened_to, Some(ElementsKind::PackedDouble));
        assert!(outcome.normalized);
        assert!(outcome.feedback_committed);
        assert_eq!(array.elements_kind(), Some(ElementsKind::Dictionary));
        assert_eq!(sites.remembered_kind(SITE), Some(ElementsKind::PackedDouble));
        assert_eq!(array.get(0).unwrap(), Value::from(1));
        assert_eq!(array.get(10_000).unwrap(), Value::from(0.5));
    }

    #[test]
    fn low_density_normalizes() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = engine.new_array();
        for i in 0..100 {
            engine.push(&mut array, Value::from(i)).unwrap();
        }
        let outcome = engine.store(&mut array, 150, Value::from(1)).unwrap();
        assert!(!outcome.normalized);
        let outcome = engine.store(&mut array, 600, Value::from(1)).unwrap();
        assert!(outcome.normalized);
        assert_eq!(array.backing_store().unwrap().occupied(), 102);
    }

    #[test]
    fn last_index_is_rejected_untouched() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = literal_array(&[1, 2, 3], Some(SITE));
        match engine.store(&mut array, usize::MAX, Value::from(0.5)) {
            Err(ElementsError::ResourceExhausted(_)) => {}
            other => panic!("expected ResourceExhausted, got {:?}", other),
        }
        assert_eq!(array.elements_kind(), Some(ElementsKind::PackedSmi));
        assert_eq!(array.len(), 3);
        assert_eq!(sites.remembered_kind(SITE), None);

        let mut array = engine.new_array();
        assert!(engine.store(&mut array, usize::MAX, Value::from(1)).is_err());
        assert_eq!(array.elements_kind(), Some(ElementsKind::PackedSmi));
        assert!(array.is_empty());
    }

    #[test]
    fn failed_growth_keeps_widening_and_feedback() {
        let config = ElementsConfig {
            sparse: SparsePolicy {
                max_gap: usize::MAX,
                min_sparse_length: usize::MAX,
                min_density: 0.0,
            },
            ..ElementsConfig::default()
        };
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = literal_array(&[1, 2, 3], Some(SITE));
        match engine.store(&mut array, usize::MAX / 2, Value::from(1.5)) {
            Err(ElementsError::ResourceExhausted(_)) => {}
            other => panic!("expected ResourceExhausted, got {:?}", other),
        }
        assert_eq!(array.elements_kind(), Some(ElementsKind::PackedDouble));
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(2), Value::from(3)]);
        assert_eq!(sites.remembered_kind(SITE), Some(ElementsKind::PackedDouble));
    }

    #[test]
    fn dictionary_stores_take_any_value() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = ArrayObject::with_kind(ElementsKind::Dictionary, 0).unwrap();
        for value in vec![Value::from(1), Value::from(1.5), Value::from("s")] {
            assert!(engine.push(&mut array, value).unwrap().is_in_place());
        }
        assert_eq!(array.len(), 3);
    }

    #[test]
    fn external_arrays_never_transition() {
        let config = ElementsConfig::default();
        let sites = SiteTable::new();
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = ArrayObject::external(ExternalArrayType::Int32, 2).unwrap();
        let outcome = engine.store(&mut array, 0, Value::from("elliot")).unwrap();
        assert!(outcome.is_in_place());
        engine.store(&mut array, 1, Value::from(2.75)).unwrap();
        engine.store(&mut array, 9, Value::from(1)).unwrap();
        assert_eq!(array.kind_label(), "external int elements");
        assert_eq!(array.to_vec(), vec![Value::from(0), Value::from(2)]);
    }

    #[test]
    fn without_smi_arrays_small_ints_are_generic() {
        let config = ElementsConfig {
            smi_only_arrays: false,
            ..ElementsConfig::default()
        };
        let sites = SiteTable::with_config(&config);
        let engine = TransitionEngine::new(&config, &sites);
        let mut array = engine.new_array();
        assert_eq!(array.kind_label(), "packed elements");
        assert!(engine.push(&mut array, Value::from(1)).unwrap().is_in_place());
    }
}
