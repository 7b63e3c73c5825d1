//! Database-backed catalog services.
//!
//! Reads load a [`crate::catalog::CatalogSnapshot`] for the requested scope and run
//! the engine over it; writes go through [`ItemService`] and
//! [`AttributeCatalogService`].

pub mod attribute_service;
pub mod item_service;
pub mod query_service;
pub mod snapshot_loader;

pub use attribute_service::{
    AttributeCatalogService, BindAttributeInput, CreateAttributeInput, EnsureChoiceInput,
};
pub use item_service::{
    AttributeInput, AttributeWriteOutcome, CreateItemInput, CreateVariantInput, CreatedItem,
    ItemService, UpdatePromotionInput,
};
pub use query_service::{
    BrowseRequest, CatalogQueryService, CategoryView, ItemCard, ItemDetail, ItemPage, PriceQuote,
};
