//! # elements-kind
//!
//! Representation selection for the elements of dynamically-typed arrays.
//!
//! Every array is backed by a store laid out for one [`ElementsKind`]:
//! packed small integers, packed doubles, packed arbitrary values, or a sparse
//! dictionary. Stores only ever move towards more general kinds, and the
//! [`TransitionEngine`] performs that widening on the indexed-store path.
//!
//! Array literals are constructed through the [`LiteralAllocator`], which keys
//! each construction point by a [`SiteId`]. When an array allocated at a site
//! has to widen, the site remembers the wider kind so that later arrays from
//! the same literal start out at that kind instead of widening again.
//!
//! ```
//! use elements_kind::{
//!     ArrayLiteral, ElementsConfig, ElementsKind, LiteralAllocator, SiteId, SiteTable,
//!     TransitionEngine, Value,
//! };
//!
//! let config = ElementsConfig::default();
//! let sites = SiteTable::with_config(&config);
//! let allocator = LiteralAllocator::new(&config, &sites);
//! let engine = TransitionEngine::new(&config, &sites);
//!
//! let literal = ArrayLiteral::of_values(SiteId::new(1, 12), vec![1, 2, 3]);
//!
//! let first = allocator.allocate(&literal).unwrap();
//! engine.store(&mut first.borrow_mut(), 0, Value::from(1.5)).unwrap();
//! assert_eq!(first.borrow().elements_kind(), Some(ElementsKind::PackedDouble));
//!
//! // The next array from the same literal starts out as doubles.
//! let second = allocator.allocate(&literal).unwrap();
//! assert_eq!(second.borrow().elements_kind(), Some(ElementsKind::PackedDouble));
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

#[cfg(test)]
#[global_allocator]
static ALLOCATOR: mockalloc::Mockalloc<std::alloc::System> = mockalloc::Mockalloc(std::alloc::System);

pub mod alloc;
pub mod array;
pub mod config;
pub mod engine;
pub mod error;
pub mod external;
pub mod kind;
pub mod literal;
pub mod site;
pub mod store;
pub mod value;

pub use array::ArrayObject;
pub use config::{ElementsConfig, SparsePolicy};
pub use engine::{StoreOutcome, TransitionEngine};
pub use error::{ElementsError, Result};
pub use external::ExternalElements;
pub use kind::{classify, is_dictionary, ArrayKind, ElementsKind, ExternalArrayType};
pub use literal::{ArrayLiteral, LiteralAllocator, LiteralElement};
pub use site::{
    shared_site_table, AllocationSite, SharedSiteTable, SiteFeedback, SiteId, SiteSnapshot,
    SiteTable,
};
pub use store::BackingStore;
pub use value::{ArrayRef, ObjectId, Value};
