//! Product catalog routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::product::{CreateProductRequest, ListProductsQuery, UpdateProductRequest};
use domain::models::Product;
use persistence::repositories::ProductRepository;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

fn product_not_found() -> ApiError {
    ApiError::NotFound("Product not found".to_string())
}

/// POST /api/v1/products
pub async fn create_product(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(mut request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    request.validate()?;
    request.name = request.name.trim().to_string();
    request.currency = request.currency.to_uppercase();

    let entity = ProductRepository::new(state.pool.clone())
        .create(auth.user_id, &request)
        .await?;
    tracing::info!(product_id = %entity.id, user_id = %auth.user_id, "Product created");

    Ok((StatusCode::CREATED, Json(entity.into())))
}

/// GET /api/v1/products?includeInactive=
pub async fn list_products(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<ProductsResponse>, ApiError> {
    let products = ProductRepository::new(state.pool.clone())
        .list_for_user(auth.user_id, query.include_inactive)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();
    Ok(Json(ProductsResponse { products }))
}

/// PATCH /api/v1/products/:id
pub async fn update_product(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    request.validate()?;
    if !request.stock_is_valid() {
        return Err(ApiError::Validation("Stock cannot be negative".to_string()));
    }

    let entity = ProductRepository::new(state.pool.clone())
        .update(auth.user_id, id, &request)
        .await?
        .ok_or_else(product_not_found)?;
    Ok(Json(entity.into()))
}

/// DELETE /api/v1/products/:id
///
/// Soft delete: the product leaves the catalog, past orders keep it.
pub async fn delete_product(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let found = ProductRepository::new(state.pool.clone())
        .deactivate(auth.user_id, id)
        .await?;
    if !found {
        return Err(product_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
