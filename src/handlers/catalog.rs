use crate::catalog::FacetOptions;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, parse_optional, success_response};
use crate::services::catalog::{BrowseRequest, CategoryView, ItemDetail, ItemPage, PriceQuote};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

/// Public catalog read routes, nested under `/catalog`.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/:slug", get(get_item))
        .route("/filters", get(get_filters))
        .route("/variants/:id/price", get(get_variant_price))
        .route("/categories", get(list_categories))
}

/// Browse parameters. Any `attr_<code>`, `attr_<code>_min` and `attr_<code>_max`
/// key is accepted as an attribute filter.
#[allow(dead_code)]
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BrowseParams {
    /// Category slug; `all`/`tous` or absent for the whole catalog
    pub category: Option<String>,
    /// Takes precedence over `category`
    pub subcategory: Option<String>,
    /// `price_asc`, `price_desc`, `new` or `default`
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub lang: Option<String>,
    /// Comma-separated brand slugs
    pub brand: Option<String>,
    /// Comma-separated color slugs
    pub color: Option<String>,
    /// Comma-separated states (`new`, `used`, `refurbished`)
    pub state: Option<String>,
    pub price_min: Option<String>,
    pub price_max: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LangParams {
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PriceAtParams {
    /// Instant to resolve the price at; defaults to now
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryParams {
    /// `1` (default) lists root categories; any other level lists all
    pub level: Option<String>,
    pub lang: Option<String>,
}

/// List catalog items
#[utoipa::path(
    get,
    path = "/api/v1/catalog/items",
    params(BrowseParams),
    responses(
        (status = 200, description = "Page of items", body = ItemPage),
        (status = 404, description = "Unknown category", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .query
        .list_items(BrowseRequest::from_pairs(&pairs))
        .await
        .map_err(map_service_error)?;
    Ok(success_response(page))
}

/// Facet options for a scope
#[utoipa::path(
    get,
    path = "/api/v1/catalog/filters",
    params(BrowseParams),
    responses(
        (status = 200, description = "Facet option sets", body = FacetOptions),
        (status = 404, description = "Unknown category", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_filters(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let options = state
        .services
        .query
        .get_facet_options(BrowseRequest::from_pairs(&pairs))
        .await
        .map_err(map_service_error)?;
    Ok(success_response(options))
}

/// Item detail by slug
#[utoipa::path(
    get,
    path = "/api/v1/catalog/items/{slug}",
    params(("slug" = String, Path, description = "Item slug"), LangParams),
    responses(
        (status = 200, description = "Item detail", body = ItemDetail),
        (status = 404, description = "Unknown item", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<LangParams>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .services
        .query
        .get_item_detail(&slug, params.lang.as_deref())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(detail))
}

/// Effective price of a variant
#[utoipa::path(
    get,
    path = "/api/v1/catalog/variants/{id}/price",
    params(("id" = i64, Path, description = "Variant id"), PriceAtParams),
    responses(
        (status = 200, description = "Resolved price", body = PriceQuote),
        (status = 404, description = "Unknown variant", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_variant_price(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<PriceAtParams>,
) -> Result<impl IntoResponse, ApiError> {
    let quote = state
        .services
        .query
        .get_effective_price(id, params.at)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(quote))
}

/// Active categories
#[utoipa::path(
    get,
    path = "/api/v1/catalog/categories",
    params(CategoryParams),
    responses(
        (status = 200, description = "Categories sorted by name", body = [CategoryView]),
        (status = 400, description = "Invalid level", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(params): Query<CategoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let level = parse_optional::<u32>(params.level.as_deref(), "level")?;
    let categories = state
        .services
        .query
        .list_categories(level, params.lang.as_deref())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(categories))
}
