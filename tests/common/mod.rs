#![allow(dead_code)]

use std::sync::Arc;

use axum::{body::Body, http::Request, Router};
use catalog_facets::{
    cache::{CacheBackend, InMemoryCache},
    config::AppConfig,
    db,
    entities::{brand, category, color, AttributeType, ItemState},
    events::{Event, EventSender},
    handlers::AppServices,
    services::catalog::{
        BindAttributeInput, CreateAttributeInput, CreateItemInput, CreateVariantInput,
        CreatedItem,
    },
    services::i18n::{IdentityTranslator, Localizer},
    services::media::{BaseUrlMediaResolver, MediaResolver},
    AppState,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Application state backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub events: mpsc::Receiver<Event>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Same as [`TestApp::new`], letting the caller adjust the configuration first.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = dir.path().join("catalog_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.pool.max_connections = 1;
        cfg.pool.min_connections = 1;
        // Tests assert on fresh reads; cached facets would hide seeded changes.
        cfg.catalog.facet_cache_ttl_secs = 0;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let (tx, rx) = mpsc::channel(64);
        let cache: Arc<dyn CacheBackend> = Arc::new(InMemoryCache::new());
        let localizer = Arc::new(Localizer::new(
            Arc::new(IdentityTranslator),
            cfg.catalog.source_language.clone(),
            cfg.catalog.supported_languages.clone(),
        ));
        let media: Arc<dyn MediaResolver> =
            Arc::new(BaseUrlMediaResolver::new(cfg.catalog.media_base_url.clone()));
        let services = AppServices::new(db.clone(), cache, localizer, media, cfg.catalog.clone());

        let state = AppState {
            db,
            config: cfg,
            event_sender: EventSender::new(tx),
            services,
        };

        Self {
            router: catalog_facets::app(state.clone()),
            state,
            events: rx,
            _dir: dir,
        }
    }

    /// Sends a request through the full router and returns status and JSON body.
    pub async fn request(&self, request: Request<Body>) -> (axum::http::StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (axum::http::StatusCode, Value) {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn send_json(&self, method: &str, uri: &str, body: Value) -> (axum::http::StatusCode, Value) {
        self.request(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn category(&self, name: &str, slug: &str, parent_id: Option<i64>) -> category::Model {
        category::ActiveModel {
            parent_id: Set(parent_id),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            description: Set(None),
            image_url: Set(Some(format!("categories/{slug}.jpg"))),
            position: Set(0),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to insert category")
    }

    pub async fn brand(&self, name: &str) -> brand::Model {
        brand::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(name.to_lowercase()),
            logo_url: Set(None),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to insert brand")
    }

    pub async fn color(&self, name: &str, active: bool) -> color::Model {
        color::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(name.to_lowercase()),
            hex_code: Set(None),
            is_active: Set(active),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to insert color")
    }

    /// Creates an attribute and binds it to `category_id`.
    pub async fn bound_attribute(
        &self,
        category_id: i64,
        code: &str,
        attribute_type: AttributeType,
        required: bool,
        display_order: i32,
    ) -> i64 {
        let attributes = &self.state.services.attributes;
        let attr = attributes
            .create_attribute(CreateAttributeInput {
                code: code.to_string(),
                label: code.to_uppercase(),
                attribute_type,
                unit: None,
                display_order,
            })
            .await
            .expect("failed to create attribute");
        attributes
            .bind_attribute(
                category_id,
                BindAttributeInput {
                    attribute_id: attr.id,
                    is_required: required,
                    display_order,
                },
            )
            .await
            .expect("failed to bind attribute");
        attr.id
    }

    pub async fn create_item(&self, input: CreateItemInput) -> CreatedItem {
        self.state
            .services
            .items
            .create_item(input)
            .await
            .expect("failed to create item")
    }
}

pub fn item_input(name: &str, category_id: i64) -> CreateItemInput {
    CreateItemInput {
        name: name.to_string(),
        slug: None,
        category_id,
        brand_id: None,
        short_description: None,
        long_description: None,
        state: Some(ItemState::New),
        is_active: true,
        is_visible: true,
        attributes: Default::default(),
        variants: Vec::new(),
    }
}

pub fn variant_input(sku: &str, base_price: Decimal, color_id: Option<i64>) -> CreateVariantInput {
    CreateVariantInput {
        sku: sku.to_string(),
        name: None,
        base_price,
        promo_price: None,
        promo_active: false,
        promo_start: None,
        promo_end: None,
        color_id,
        stock_quantity: 3,
        attributes: Default::default(),
    }
}

/// Attribute input map from `(code, value)` pairs.
pub fn attrs(pairs: &[(&str, Value)]) -> catalog_facets::services::catalog::AttributeInput {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
