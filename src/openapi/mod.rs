use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Catalog Facets API",
        version = "0.1.0",
        description = r#"
# Faceted catalog

Browse items by category scope with typed attribute, brand, color, state and price
filters, and fetch the facet options that remain meaningful for a scope.

## Filters

- `brand`, `color`, `state`: comma-separated slugs or codes
- `price_min`, `price_max`: decimal bounds
- `attr_<code>`: comma-separated values; numeric attributes also take
  `attr_<code>_min` / `attr_<code>_max`

Values within one facet are ORed; facets are ANDed. Unknown attribute codes and
unparsable numbers are ignored.

## Pagination

`page` starts at 1, `page_size` defaults to 24 with a maximum of 100.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Catalog", description = "Browse, facet and price endpoints"),
        (name = "Catalog admin", description = "Attribute, binding and item write endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Catalog
        crate::handlers::catalog::list_items,
        crate::handlers::catalog::get_filters,
        crate::handlers::catalog::get_item,
        crate::handlers::catalog::get_variant_price,
        crate::handlers::catalog::list_categories,

        // Catalog admin
        crate::handlers::catalog_admin::create_attribute,
        crate::handlers::catalog_admin::set_attribute_active,
        crate::handlers::catalog_admin::list_choice_values,
        crate::handlers::catalog_admin::ensure_choice_value,
        crate::handlers::catalog_admin::bind_attribute,
        crate::handlers::catalog_admin::required_attributes,
        crate::handlers::catalog_admin::create_item,
        crate::handlers::catalog_admin::set_item_attributes,
        crate::handlers::catalog_admin::set_variant_attributes,
        crate::handlers::catalog_admin::update_variant_promotion,

        // Health
        crate::health_check
    ),
    components(
        schemas(
            // Read models
            crate::services::catalog::ItemPage,
            crate::services::catalog::ItemCard,
            crate::services::catalog::ItemDetail,
            crate::services::catalog::PriceQuote,
            crate::services::catalog::CategoryView,
            crate::catalog::FacetOptions,
            crate::catalog::SortOrder,

            // Write models
            crate::services::catalog::CreateAttributeInput,
            crate::services::catalog::EnsureChoiceInput,
            crate::services::catalog::BindAttributeInput,
            crate::services::catalog::CreateItemInput,
            crate::services::catalog::CreateVariantInput,
            crate::services::catalog::UpdatePromotionInput,
            crate::services::catalog::AttributeWriteOutcome,
            crate::handlers::catalog_admin::SetActiveRequest,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_catalog_paths() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Catalog Facets API"));
        assert!(json.contains("/api/v1/catalog/items"));
        assert!(json.contains("/api/v1/catalog/filters"));
        assert!(json.contains("/api/v1/catalog/admin/items"));
    }
}
