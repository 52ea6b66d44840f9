//! Storefront HTTP routes.
//!
//! - `GET  /categories`                  every category, by name
//! - `GET  /categories/{slug}/products` one category and its products
//! - `GET  /products/{slug}?limit=N` product detail with recommendations
//! - `POST /products/{id}/save`      toggle the viewer's saved state
//! - `POST /cart/items`              add a product to the viewer's cart
//! - `PUT  /cart/items/{id}`         set a cart line's quantity, zero removes it
//! - `GET  /cart`                    the viewer's cart lines
//! - `GET  /saved`                   the viewer's saved products
//! - `GET  /health`                  database readiness

use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use storefront_core::config::RecommendationConfig;
use storefront_core::domain::catalog::{Category, Product, ProductId};
use storefront_core::domain::interaction::CartLine;
use storefront_core::recommendations::{
    RecommendationEngine, RecommendationRequest, RecommendationStage,
};
use storefront_db::repositories::{CategoryRepository, InteractionRepository, ProductRepository};
use storefront_db::{DbPool, SqlCatalogStore, SqlInteractionStore};
use tracing::info;

use crate::error::ApiError;
use crate::health;
use crate::request::{correlation_middleware, CorrelationId, Viewer};

#[derive(Clone)]
pub struct AppState {
    engine: RecommendationEngine<SqlCatalogStore>,
    interactions: SqlInteractionStore,
    limits: RecommendationConfig,
}

impl AppState {
    pub fn new(db_pool: DbPool, limits: RecommendationConfig) -> Self {
        Self {
            engine: RecommendationEngine::new(SqlCatalogStore::new(db_pool.clone())),
            interactions: SqlInteractionStore::new(db_pool),
            limits,
        }
    }

    fn catalog(&self) -> &SqlCatalogStore {
        self.engine.source()
    }
}

pub fn router(state: AppState) -> Router {
    let db_pool = state.catalog().pool().clone();

    // Path parameter names must agree across routes sharing a prefix.
    Router::new()
        .route("/categories", get(categories))
        .route("/categories/{category}/products", get(category_products))
        .route("/products/{product}", get(product_detail))
        .route("/products/{product}/save", post(toggle_save))
        .route("/cart/items", post(add_cart_item))
        .route("/cart/items/{product}", put(update_cart_item))
        .route("/cart", get(cart))
        .route("/saved", get(saved_products))
        .with_state(state)
        .merge(health::router(db_pool))
        .layer(middleware::from_fn(correlation_middleware))
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub in_stock: bool,
}

impl From<Product> for ListedProduct {
    fn from(product: Product) -> Self {
        let in_stock = product.in_stock();
        Self { product, in_stock }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryListing {
    pub category: Category,
    pub products: Vec<ListedProduct>,
}

#[derive(Debug, Serialize)]
pub struct RecommendedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub stage: RecommendationStage,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub recommendations: Vec<RecommendedProduct>,
    pub is_saved: bool,
}

#[derive(Debug, Serialize)]
pub struct SaveState {
    pub product_id: ProductId,
    pub saved: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItem {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItem {
    pub quantity: u32,
}

async fn categories(
    State(state): State<AppState>,
    correlation: CorrelationId,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = state
        .catalog()
        .list_categories()
        .await
        .map_err(|error| ApiError::repository(error, correlation.as_str()))?;
    Ok(Json(categories))
}

async fn category_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    correlation: CorrelationId,
) -> Result<Json<CategoryListing>, ApiError> {
    let correlation_id = correlation.as_str();

    let category = state
        .catalog()
        .find_category_by_slug(&slug)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?
        .ok_or_else(|| {
            ApiError::not_found(format!("no category with slug `{slug}`"), correlation_id)
        })?;
    let products = state
        .catalog()
        .list_by_category(category.id)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;

    info!(
        event_name = "storefront.category.listed",
        correlation_id = %correlation_id,
        category_id = %category.id,
        product_count = products.len(),
        "category listing served"
    );

    let products = products.into_iter().map(ListedProduct::from).collect();
    Ok(Json(CategoryListing { category, products }))
}

async fn product_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<DetailQuery>,
    correlation: CorrelationId,
    viewer: Viewer,
) -> Result<Json<ProductDetail>, ApiError> {
    let correlation_id = correlation.as_str();

    let product = state
        .catalog()
        .find_by_slug(&slug)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?
        .ok_or_else(|| {
            ApiError::not_found(format!("no product with slug `{slug}`"), correlation_id)
        })?;

    let limit = state.limits.effective_limit(query.limit);
    let request = RecommendationRequest::new(product.id).with_viewer(viewer.0).with_limit(limit);
    let ranked = state
        .engine
        .recommend(&request)
        .await
        .map_err(|error| ApiError::application(error, correlation_id))?;

    let mut recommendations = Vec::with_capacity(ranked.len());
    for item in &ranked.items {
        let recommended = state
            .catalog()
            .find_by_id(item.product_id)
            .await
            .map_err(|error| ApiError::repository(error, correlation_id))?;
        if let Some(recommended) = recommended {
            recommendations.push(RecommendedProduct { product: recommended, stage: item.stage });
        }
    }

    let is_saved = match viewer.0 {
        Some(user_id) => state
            .interactions
            .is_saved(user_id, product.id)
            .await
            .map_err(|error| ApiError::repository(error, correlation_id))?,
        None => false,
    };

    info!(
        event_name = "storefront.product.viewed",
        correlation_id = %correlation_id,
        product_id = %product.id,
        viewer = ?viewer.0.map(|user_id| user_id.0),
        limit,
        recommendation_count = recommendations.len(),
        "product detail served"
    );

    Ok(Json(ProductDetail { product, recommendations, is_saved }))
}

async fn toggle_save(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    correlation: CorrelationId,
    viewer: Viewer,
) -> Result<Json<SaveState>, ApiError> {
    let correlation_id = correlation.as_str();
    let user_id = viewer.require(&correlation)?;
    let product_id = ProductId(product_id);

    ensure_product(&state, product_id, correlation_id).await?;
    let toggle = state
        .interactions
        .toggle_saved(user_id, product_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;

    info!(
        event_name = "storefront.saved_item.toggled",
        correlation_id = %correlation_id,
        product_id = %product_id,
        user_id = %user_id,
        saved = toggle.is_saved(),
        "saved item toggled"
    );

    Ok(Json(SaveState { product_id, saved: toggle.is_saved() }))
}

async fn add_cart_item(
    State(state): State<AppState>,
    correlation: CorrelationId,
    viewer: Viewer,
    Json(body): Json<AddCartItem>,
) -> Result<Json<CartLine>, ApiError> {
    let correlation_id = correlation.as_str();
    let user_id = viewer.require(&correlation)?;
    if body.quantity == 0 {
        return Err(ApiError::bad_request("quantity must be greater than zero", correlation_id));
    }

    let product_id = ProductId(body.product_id);
    ensure_product(&state, product_id, correlation_id).await?;
    let line = state
        .interactions
        .add_to_cart(user_id, product_id, body.quantity)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;

    info!(
        event_name = "storefront.cart.item_added",
        correlation_id = %correlation_id,
        product_id = %product_id,
        user_id = %user_id,
        quantity = line.quantity,
        "cart item added"
    );

    Ok(Json(line))
}

async fn update_cart_item(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    correlation: CorrelationId,
    viewer: Viewer,
    Json(body): Json<UpdateCartItem>,
) -> Result<Json<Vec<CartLine>>, ApiError> {
    let correlation_id = correlation.as_str();
    let user_id = viewer.require(&correlation)?;
    let product_id = ProductId(product_id);

    let updated = state
        .interactions
        .set_cart_quantity(user_id, product_id, body.quantity)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;
    if !updated {
        return Err(ApiError::not_found(
            format!("product {product_id} is not in the cart"),
            correlation_id,
        ));
    }

    info!(
        event_name = "storefront.cart.item_updated",
        correlation_id = %correlation_id,
        product_id = %product_id,
        user_id = %user_id,
        quantity = body.quantity,
        "cart item updated"
    );

    let lines = state
        .interactions
        .cart_lines(user_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;
    Ok(Json(lines))
}

async fn cart(
    State(state): State<AppState>,
    correlation: CorrelationId,
    viewer: Viewer,
) -> Result<Json<Vec<CartLine>>, ApiError> {
    let user_id = viewer.require(&correlation)?;
    let lines = state
        .interactions
        .cart_lines(user_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation.as_str()))?;
    Ok(Json(lines))
}

async fn saved_products(
    State(state): State<AppState>,
    correlation: CorrelationId,
    viewer: Viewer,
) -> Result<Json<Vec<Product>>, ApiError> {
    let user_id = viewer.require(&correlation)?;
    let products = state
        .interactions
        .saved_products(user_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation.as_str()))?;
    Ok(Json(products))
}

async fn ensure_product(
    state: &AppState,
    product_id: ProductId,
    correlation_id: &str,
) -> Result<(), ApiError> {
    state
        .catalog()
        .find_by_id(product_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?
        .map(|_| ())
        .ok_or_else(|| {
            ApiError::not_found(format!("product {product_id} does not exist"), correlation_id)
        })
}
