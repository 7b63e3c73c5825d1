use crate::errors::ApiError;
use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::services::catalog::{
    AttributeInput, AttributeWriteOutcome, BindAttributeInput, CreateAttributeInput,
    CreateItemInput, EnsureChoiceInput, UpdatePromotionInput,
};
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

/// Catalog write routes, nested under `/catalog/admin`.
pub fn catalog_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/attributes", post(create_attribute))
        .route("/attributes/:id/active", put(set_attribute_active))
        .route(
            "/attributes/:id/choices",
            get(list_choice_values).post(ensure_choice_value),
        )
        .route("/categories/:id/attributes", put(bind_attribute))
        .route("/categories/:id/required-attributes", get(required_attributes))
        .route("/items", post(create_item))
        .route("/items/:id/attributes", put(set_item_attributes))
        .route("/variants/:id/attributes", put(set_variant_attributes))
        .route("/variants/:id/promotion", put(update_variant_promotion))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Create an attribute definition
#[utoipa::path(
    post,
    path = "/api/v1/catalog/admin/attributes",
    request_body = CreateAttributeInput,
    responses(
        (status = 201, description = "Attribute created"),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog admin"
)]
pub async fn create_attribute(
    State(state): State<AppState>,
    Json(payload): Json<CreateAttributeInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let attribute = state
        .services
        .attributes
        .create_attribute(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(attribute))
}

/// Activate or deactivate an attribute
#[utoipa::path(
    put,
    path = "/api/v1/catalog/admin/attributes/{id}/active",
    params(("id" = i64, Path, description = "Attribute id")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Attribute updated"),
        (status = 404, description = "Unknown attribute", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog admin"
)]
pub async fn set_attribute_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let attribute = state
        .services
        .attributes
        .set_attribute_active(id, payload.is_active)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(attribute))
}

/// Choice values of an attribute
#[utoipa::path(
    get,
    path = "/api/v1/catalog/admin/attributes/{id}/choices",
    params(("id" = i64, Path, description = "Attribute id")),
    responses(
        (status = 200, description = "Choice values sorted by value"),
        (status = 404, description = "Unknown attribute", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog admin"
)]
pub async fn list_choice_values(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let choices = state
        .services
        .attributes
        .list_choice_values(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(choices))
}

/// Ensure a choice value exists; repeated calls return the same row
#[utoipa::path(
    post,
    path = "/api/v1/catalog/admin/attributes/{id}/choices",
    params(("id" = i64, Path, description = "Attribute id")),
    request_body = EnsureChoiceInput,
    responses(
        (status = 200, description = "Existing or created choice value"),
        (status = 400, description = "Not a choice attribute", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown attribute", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog admin"
)]
pub async fn ensure_choice_value(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<EnsureChoiceInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let choice = state
        .services
        .attributes
        .ensure_choice_value(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(choice))
}

/// Bind an attribute to a category (upsert)
#[utoipa::path(
    put,
    path = "/api/v1/catalog/admin/categories/{id}/attributes",
    params(("id" = i64, Path, description = "Category id")),
    request_body = BindAttributeInput,
    responses(
        (status = 200, description = "Binding stored"),
        (status = 404, description = "Unknown category or attribute", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog admin"
)]
pub async fn bind_attribute(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<BindAttributeInput>,
) -> Result<impl IntoResponse, ApiError> {
    let binding = state
        .services
        .attributes
        .bind_attribute(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(binding))
}

/// Codes required for items of a category, including inherited requirements
#[utoipa::path(
    get,
    path = "/api/v1/catalog/admin/categories/{id}/required-attributes",
    params(("id" = i64, Path, description = "Category id")),
    responses((status = 200, description = "Sorted attribute codes", body = [String])),
    tag = "Catalog admin"
)]
pub async fn required_attributes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let codes = state
        .services
        .attributes
        .required_codes(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(codes))
}

/// Create an item with variants and attribute values
#[utoipa::path(
    post,
    path = "/api/v1/catalog/admin/items",
    request_body = CreateItemInput,
    responses(
        (status = 201, description = "Item created"),
        (status = 400, description = "Invalid payload or missing required attributes", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slug or sku already used", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog admin"
)]
pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let created = state
        .services
        .items
        .create_item(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(created))
}

/// Upsert item-level attribute values
#[utoipa::path(
    put,
    path = "/api/v1/catalog/admin/items/{id}/attributes",
    request_body(content = Object, description = "Attribute code (`ram` or `attr_ram`) to value"),
    params(("id" = i64, Path, description = "Item id")),
    responses(
        (status = 200, description = "Write outcome", body = AttributeWriteOutcome),
        (status = 400, description = "Invalid value", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown item", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog admin"
)]
pub async fn set_item_attributes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AttributeInput>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .items
        .set_item_attributes(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(outcome))
}

/// Upsert variant-level attribute values
#[utoipa::path(
    put,
    path = "/api/v1/catalog/admin/variants/{id}/attributes",
    request_body(content = Object, description = "Attribute code (`ram` or `attr_ram`) to value"),
    params(("id" = i64, Path, description = "Variant id")),
    responses(
        (status = 200, description = "Write outcome", body = AttributeWriteOutcome),
        (status = 400, description = "Invalid value", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown variant", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog admin"
)]
pub async fn set_variant_attributes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AttributeInput>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .items
        .set_variant_attributes(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(outcome))
}

/// Replace a variant's promotion
#[utoipa::path(
    put,
    path = "/api/v1/catalog/admin/variants/{id}/promotion",
    params(("id" = i64, Path, description = "Variant id")),
    request_body = UpdatePromotionInput,
    responses(
        (status = 200, description = "Variant updated"),
        (status = 400, description = "Invalid promotion", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown variant", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog admin"
)]
pub async fn update_variant_promotion(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePromotionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let variant = state
        .services
        .items
        .update_variant_promotion(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(variant))
}
