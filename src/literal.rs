//! Array-literal construction
//!
//! Each literal in a program is keyed by its [`SiteId`]. Allocation starts
//! the new array at the kind its site remembers, so an array from a literal
//! that has widened before is created wide instead of widening again on its
//! first store.

use tracing::{debug, trace};

use crate::array::ArrayObject;
use crate::config::ElementsConfig;
use crate::error::Result;
use crate::kind::ElementsKind;
use crate::site::{SiteFeedback, SiteId};
use crate::store::BackingStore;
use crate::value::{ArrayRef, Value};

/// An array literal as it appears in the program: its site and its element
/// expressions, already evaluated.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayLiteral {
    site: SiteId,
    elements: Vec<LiteralElement>,
}

/// One element of an [`ArrayLiteral`]
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralElement {
    /// An evaluated value
    Value(Value),
    /// A nested array literal, allocated through its own site
    Array(ArrayLiteral),
}

impl From<Value> for LiteralElement {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ArrayLiteral> for LiteralElement {
    fn from(literal: ArrayLiteral) -> Self {
        Self::Array(literal)
    }
}

impl ArrayLiteral {
    /// Creates a literal at `site`.
    pub fn new(site: SiteId, elements: Vec<LiteralElement>) -> Self {
        Self { site, elements }
    }

    /// Creates a literal at `site` whose elements are all plain values.
    pub fn of_values<I>(site: SiteId, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::new(
            site,
            values
                .into_iter()
                .map(|v| LiteralElement::Value(v.into()))
                .collect(),
        )
    }

    /// The literal's site.
    #[must_use]
    pub fn site(&self) -> SiteId {
        self.site
    }

    /// The literal's elements.
    #[must_use]
    pub fn elements(&self) -> &[LiteralElement] {
        &self.elements
    }

    /// Sites of the literals nested directly in this one, in order.
    #[must_use]
    pub fn nested_sites(&self) -> Vec<SiteId> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                LiteralElement::Array(nested) => Some(nested.site),
                LiteralElement::Value(_) => None,
            })
            .collect()
    }
}

/// Allocates arrays for literals, consulting and updating site feedback.
pub struct LiteralAllocator<'a> {
    config: &'a ElementsConfig,
    sites: &'a dyn SiteFeedback,
}

impl<'a> LiteralAllocator<'a> {
    /// Creates an allocator over `sites`.
    pub fn new(config: &'a ElementsConfig, sites: &'a dyn SiteFeedback) -> Self {
        Self { config, sites }
    }

    /// Allocates a new array for `literal`.
    ///
    /// The array's kind is at least the kind the site remembers and at least
    /// general enough for every element. Nested literals are allocated first,
    /// each at its own site.
    pub fn allocate(&self, literal: &ArrayLiteral) -> Result<ArrayRef> {
        let feedback = self.config.allocation_site_feedback;
        let site = literal.site;

        let initial = if feedback {
            let remembered = self.sites.lookup_or_create(site).remembered_kind();
            let nested = literal.nested_sites();
            if !nested.is_empty() {
                self.sites.record_nested(site, &nested);
            }
            remembered.join(self.config.initial_kind())
        } else {
            self.config.initial_kind()
        };

        let mut values = Vec::with_capacity(literal.elements.len());
        for element in &literal.elements {
            values.push(match element {
                LiteralElement::Value(value) => value.clone(),
                LiteralElement::Array(nested) => Value::Array(self.allocate(nested)?),
            });
        }

        let actual = values
            .iter()
            .fold(initial, |kind, v| kind.join(self.config.classify(v)));

        let mut store = BackingStore::create(actual, values.len())?;
        for (index, value) in values.into_iter().enumerate() {
            store.set(index, value)?;
        }

        if feedback && actual > initial && self.sites.raise(site, actual) {
            debug!(site = %site, from = ?initial, to = ?actual, "allocation site: feedback committed");
        }
        trace!(site = %site, kind = ?actual, length = store.len(), "literal: allocated");

        let site = if feedback { Some(site) } else { None };
        Ok(ArrayObject::from_store(store, site).into_ref())
    }

    /// Kind the next array from `site` would start at, before looking at its
    /// elements.
    #[must_use]
    pub fn preselected_kind(&self, site: SiteId) -> ElementsKind {
        let initial = self.config.initial_kind();
        if !self.config.allocation_site_feedback {
            return initial;
        }
        self.sites
            .remembered_kind(site)
            .map_or(initial, |kind| kind.join(initial))
    }
}

impl std::fmt::Debug for LiteralAllocator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiteralAllocator")
            .field("config", self.config)
            .field("sites", &self.sites.len())
            .finish()
    }
}
