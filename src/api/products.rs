//! Read-only product catalogue.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ResultExt};
use super::extract::{ApiPath, ApiQuery};
use crate::db::{Database, Product};

#[derive(Clone)]
pub struct ProductsState {
    pub db: Database,
}

pub fn router(state: ProductsState) -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
        .with_state(state)
}

#[derive(Deserialize)]
struct ListParams {
    category: Option<String>,
}

#[derive(Serialize)]
struct ProductList {
    products: Vec<Product>,
}

#[derive(Serialize)]
struct ProductEnvelope {
    product: Product,
}

async fn list_products(
    State(state): State<ProductsState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let products = state
        .db
        .products()
        .list(category)
        .await
        .db_err("Failed to list products")?;

    Ok(Json(ProductList { products }))
}

async fn get_product(
    State(state): State<ProductsState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .db
        .products()
        .get_by_id(id)
        .await
        .db_err("Failed to get product")?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(Json(ProductEnvelope { product }))
}
