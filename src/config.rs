//! Runtime switches for element representation

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::kind::{classify, ElementsKind};
use crate::value::Value;

/// Configuration of the elements machinery.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use elements_kind::ElementsConfig;
///
/// let config = ElementsConfig::from_json(r#"{ "smi_only_arrays": false }"#).unwrap();
/// assert!(!config.smi_only_arrays);
/// assert!(config.allocation_site_feedback);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElementsConfig {
    /// Remember widenings per allocation site and pre-widen later literals
    /// from the same site.
    pub allocation_site_feedback: bool,
    /// Use the unboxed small-integer layout. When disabled, small integers
    /// are classified as generic values.
    pub smi_only_arrays: bool,
    /// When a packed store gives way to a dictionary.
    pub sparse: SparsePolicy,
}

impl Default for ElementsConfig {
    fn default() -> Self {
        Self {
            allocation_site_feedback: true,
            smi_only_arrays: true,
            sparse: SparsePolicy::default(),
        }
    }
}

impl ElementsConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Classifies `value`, honoring `smi_only_arrays`.
    #[must_use]
    pub fn classify(&self, value: &Value) -> ElementsKind {
        match classify(value) {
            ElementsKind::PackedSmi if !self.smi_only_arrays => ElementsKind::Packed,
            kind => kind,
        }
    }

    /// Kind of a fresh array that has no elements yet.
    #[must_use]
    pub fn initial_kind(&self) -> ElementsKind {
        if self.smi_only_arrays {
            ElementsKind::PackedSmi
        } else {
            ElementsKind::Packed
        }
    }
}

/// Density rules for packed stores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SparsePolicy {
    /// A store this many slots or more past the current length goes sparse
    /// immediately.
    pub max_gap: usize,
    /// Stores shorter than this are never normalized for low density.
    pub min_sparse_length: usize,
    /// Fraction of non-hole slots below which a store goes sparse.
    pub min_density: f64,
}

impl Default for SparsePolicy {
    fn default() -> Self {
        Self {
            max_gap: 1024,
            min_sparse_length: 64,
            min_density: 0.25,
        }
    }
}

impl SparsePolicy {
    /// Decides whether writing slot `index` of a packed store with `length`
    /// slots, leaving `occupied_after` non-hole slots, should normalize the
    /// store to a dictionary first.
    #[must_use]
    pub fn should_normalize(&self, index: usize, length: usize, occupied_after: usize) -> bool {
        if index >= length && index - length >= self.max_gap {
            return true;
        }
        let new_length = length.max(index.saturating_add(1));
        if new_length < self.min_sparse_length {
            return false;
        }
        (occupied_after as f64) < self.min_density * new_length as f64
    }
}
