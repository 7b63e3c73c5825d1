pub mod catalog;
pub mod catalog_admin;
pub mod common;

use crate::cache::CacheBackend;
use crate::config::CatalogConfig;
use crate::services::catalog::{AttributeCatalogService, CatalogQueryService, ItemService};
use crate::services::i18n::Localizer;
use crate::services::media::MediaResolver;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use crate::AppState;

/// Catalog services shared by the read and admin routers
#[derive(Clone)]
pub struct AppServices {
    pub query: Arc<CatalogQueryService>,
    pub items: Arc<ItemService>,
    pub attributes: Arc<AttributeCatalogService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cache: Arc<dyn CacheBackend>,
        localizer: Arc<Localizer>,
        media: Arc<dyn MediaResolver>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            query: Arc::new(CatalogQueryService::new(
                db.clone(),
                cache,
                localizer,
                media,
                config,
            )),
            items: Arc::new(ItemService::new(db.clone())),
            attributes: Arc::new(AttributeCatalogService::new(db)),
        }
    }
}
