//! Allocation sites and their transition memory
//!
//! An allocation site is a literal-construction point in the program. Each
//! site remembers the most general [`ElementsKind`] any array it produced has
//! had to widen to. The remembered kind only ever goes up.
//!
//! Two tables are provided. [`SiteTable`] is for a single-threaded embedding
//! and is meant to be created alongside the engine and injected into it.
//! [`SharedSiteTable`] can be shared between threads: raises take the
//! entry's lock and compose with `join`, so concurrent raises are never lost.
//! Neither table deletes sites; a fresh table is a new instance.

use std::cell::RefCell;
use std::fmt::{self, Display, Formatter};

use dashmap::DashMap;
use hashbrown::HashMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::ElementsConfig;
use crate::error::Result;
use crate::kind::ElementsKind;

/// Stable identity of a literal-construction point: the script and the
/// source position of the literal within it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId {
    /// Script the literal appears in
    pub script: u32,
    /// Source position of the literal
    pub position: u32,
}

impl SiteId {
    /// Creates a site id.
    #[must_use]
    pub const fn new(script: u32, position: u32) -> Self {
        Self { script, position }
    }
}

impl Display for SiteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.script, self.position)
    }
}

/// Feedback record for one allocation site
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationSite {
    site_id: SiteId,
    remembered_kind: ElementsKind,
    nested_site_ids: Vec<SiteId>,
}

impl AllocationSite {
    fn new(site_id: SiteId, kind: ElementsKind) -> Self {
        trace!(site = %site_id, kind = ?kind, "allocation site: created");
        Self {
            site_id,
            remembered_kind: kind,
            nested_site_ids: Vec::new(),
        }
    }

    /// The site's identity.
    #[must_use]
    pub fn site_id(&self) -> SiteId {
        self.site_id
    }

    /// Most general kind any array from this site has needed.
    #[must_use]
    pub fn remembered_kind(&self) -> ElementsKind {
        self.remembered_kind
    }

    /// Sites of the array literals nested directly in this one, in order.
    #[must_use]
    pub fn nested_site_ids(&self) -> &[SiteId] {
        &self.nested_site_ids
    }

    fn raise(&mut self, kind: ElementsKind) -> bool {
        let raised = self.remembered_kind.join(feedback_kind(kind));
        if raised == self.remembered_kind {
            return false;
        }
        self.remembered_kind = raised;
        true
    }

    fn record_nested(&mut self, nested: &[SiteId]) {
        if self.nested_site_ids.is_empty() {
            self.nested_site_ids.extend_from_slice(nested);
        }
    }

    fn snapshot(&self) -> SiteSnapshot {
        SiteSnapshot {
            site: self.site_id,
            remembered_kind: self.remembered_kind,
            nested: self.nested_site_ids.clone(),
        }
    }
}

/// Sites only learn packed kinds. Going sparse is a property of one array's
/// index pattern, not of the literal that created it.
fn feedback_kind(kind: ElementsKind) -> ElementsKind {
    if kind.is_dictionary() {
        ElementsKind::Packed
    } else {
        kind
    }
}

/// Serializable view of one site, for feedback dumps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSnapshot {
    /// The site
    pub site: SiteId,
    /// Its remembered kind
    pub remembered_kind: ElementsKind,
    /// Its nested literal sites
    pub nested: Vec<SiteId>,
}

/// Access to allocation-site feedback. Implemented by both site tables so
/// that the engine and allocator can be used with either.
pub trait SiteFeedback {
    /// Returns the site's record, creating it at the least general kind on
    /// first lookup.
    fn lookup_or_create(&self, site: SiteId) -> AllocationSite;

    /// Raises the site's remembered kind to `join(current, kind)`. Returns
    /// `true` if the remembered kind changed.
    fn raise(&self, site: SiteId, kind: ElementsKind) -> bool;

    /// The site's remembered kind, if the site has been seen.
    fn remembered_kind(&self, site: SiteId) -> Option<ElementsKind>;

    /// Records the nested literal sites of `site`. Only the first recording
    /// sticks.
    fn record_nested(&self, site: SiteId, nested: &[SiteId]);

    /// Number of known sites.
    fn len(&self) -> usize;

    /// Returns `true` if no site has been seen yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All sites, ordered by id.
    fn snapshot(&self) -> Vec<SiteSnapshot>;

    /// All sites as a JSON document.
    fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }
}

/// Single-threaded site table.
#[derive(Debug)]
pub struct SiteTable {
    sites: RefCell<HashMap<SiteId, AllocationSite>>,
    least_kind: ElementsKind,
}

impl Default for SiteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteTable {
    /// Creates an empty table whose new sites start at `PackedSmi`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_least_kind(ElementsKind::PackedSmi)
    }

    /// Creates an empty table whose new sites start at the configuration's
    /// initial kind.
    #[must_use]
    pub fn with_config(config: &ElementsConfig) -> Self {
        Self::with_least_kind(config.initial_kind())
    }

    fn with_least_kind(least_kind: ElementsKind) -> Self {
        Self {
            sites: RefCell::new(HashMap::new()),
            least_kind,
        }
    }
}

impl SiteFeedback for SiteTable {
    fn lookup_or_create(&self, site: SiteId) -> AllocationSite {
        let least_kind = self.least_kind;
        self.sites
            .borrow_mut()
            .entry(site)
            .or_insert_with(|| AllocationSite::new(site, least_kind))
            .clone()
    }

    fn raise(&self, site: SiteId, kind: ElementsKind) -> bool {
        let least_kind = self.least_kind;
        self.sites
            .borrow_mut()
            .entry(site)
            .or_insert_with(|| AllocationSite::new(site, least_kind))
            .raise(kind)
    }

    fn remembered_kind(&self, site: SiteId) -> Option<ElementsKind> {
        self.sites.borrow().get(&site).map(AllocationSite::remembered_kind)
    }

    fn record_nested(&self, site: SiteId, nested: &[SiteId]) {
        let least_kind = self.least_kind;
        self.sites
            .borrow_mut()
            .entry(site)
            .or_insert_with(|| AllocationSite::new(site, least_kind))
            .record_nested(nested);
    }

    fn len(&self) -> usize {
        self.sites.borrow().len()
    }

    fn snapshot(&self) -> Vec<SiteSnapshot> {
        let mut sites: Vec<_> = self.sites.borrow().values().map(AllocationSite::snapshot).collect();
        sites.sort_by_key(|s| s.site);
        sites
    }
}

/// Thread-safe site table. Each entry is updated under its shard lock.
#[derive(Debug)]
pub struct SharedSiteTable {
    sites: DashMap<SiteId, AllocationSite>,
    least_kind: ElementsKind,
}

impl Default for SharedSiteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSiteTable {
    /// Creates an empty table whose new sites start at `PackedSmi`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_least_kind(ElementsKind::PackedSmi)
    }

    /// Creates an empty table whose new sites start at the configuration's
    /// initial kind.
    #[must_use]
    pub fn with_config(config: &ElementsConfig) -> Self {
        Self::with_least_kind(config.initial_kind())
    }

    fn with_least_kind(least_kind: ElementsKind) -> Self {
        Self {
            sites: DashMap::new(),
            least_kind,
        }
    }
}

impl SiteFeedback for SharedSiteTable {
    fn lookup_or_create(&self, site: SiteId) -> AllocationSite {
        let least_kind = self.least_kind;
        self.sites
            .entry(site)
            .or_insert_with(|| AllocationSite::new(site, least_kind))
            .clone()
    }

    fn raise(&self, site: SiteId, kind: ElementsKind) -> bool {
        let least_kind = self.least_kind;
        self.sites
            .entry(site)
            .or_insert_with(|| AllocationSite::new(site, least_kind))
            .raise(kind)
    }

    fn remembered_kind(&self, site: SiteId) -> Option<ElementsKind> {
        self.sites.get(&site).map(|entry| entry.remembered_kind())
    }

    fn record_nested(&self, site: SiteId, nested: &[SiteId]) {
        let least_kind = self.least_kind;
        self.sites
            .entry(site)
            .or_insert_with(|| AllocationSite::new(site, least_kind))
            .record_nested(nested);
    }

    fn len(&self) -> usize {
        self.sites.len()
    }

    fn snapshot(&self) -> Vec<SiteSnapshot> {
        let mut sites: Vec<_> = self.sites.iter().map(|entry| entry.snapshot()).collect();
        sites.sort_by_key(|s| s.site);
        sites
    }
}

lazy_static! {
    static ref SHARED_SITES: SharedSiteTable = SharedSiteTable::new();
}

/// Process-wide shared site table, created on first use. Embeddings that
/// manage their own table lifecycle should prefer an explicit
/// [`SiteTable`] or [`SharedSiteTable`].
pub fn shared_site_table() -> &'static SharedSiteTable {
    &SHARED_SITES
}
