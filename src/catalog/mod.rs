//! Query engine over the EAV catalog.
//!
//! Everything in here is synchronous and storage-agnostic: the services load a
//! [`snapshot::CatalogSnapshot`] for the requested scope and hand it to the filter
//! compiler, the facet aggregator and the listing assembler.

pub mod attribute_value;
pub mod facets;
pub mod filter;
pub mod listing;
pub mod pricing;
pub mod scope;
pub mod snapshot;

pub use attribute_value::{AttributeValue, ChoiceRef, ParsedInput, ValueSlots};
pub use facets::{Aggregator, FacetOptions};
pub use filter::{compile, CompileOptions, CompiledFilter, FacetKey, FilterTerms};
pub use listing::{assemble, Listing, ListingEntry, PageRequest, SortOrder};
pub use pricing::PriceFields;
pub use scope::{Scope, ScopeError};
pub use snapshot::{CatalogSnapshot, ItemRecord, StoredValue, VariantRecord};
