use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::product::PRODUCT_COLUMNS;
use crate::models::{CreateProductRequest, Product, Role, UpdateProductRequest};
use crate::services::carts;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub category: Option<String>,
    pub seller_uid: Option<String>,
}

pub async fn list_products(
    query: web::Query<ProductFilter>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let filter = query.into_inner();

    let rows = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE (? IS NULL OR category = ?) AND (? IS NULL OR seller_uid = ?) \
         ORDER BY created_at DESC"
    ))
    .bind(&filter.category)
    .bind(&filter.category)
    .bind(&filter.seller_uid)
    .bind(&filter.seller_uid)
    .fetch_all(&state.pool)
    .await?;
    let products = rows
        .iter()
        .map(Product::from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(json!({ "count": products.len(), "products": products })))
}

pub async fn get_product(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let product = carts::find_product(&mut conn, &path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("product"))?;
    Ok(HttpResponse::Ok().json(product))
}

pub async fn create_product(
    identity: Identity,
    data: web::Json<CreateProductRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let seller = identity.require(&state.pool, &[Role::Seller]).await?;
    let req = data.into_inner();
    req.validate().map_err(AppError::BadRequest)?;

    let product = Product {
        id: Uuid::new_v4().to_string(),
        seller_uid: seller.uid,
        name: req.name.trim().to_string(),
        price: req.price,
        category: req.category.trim().to_string(),
        product_image: req.product_image,
        stock: req.stock,
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(&format!(
        "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&product.id)
    .bind(&product.seller_uid)
    .bind(&product.name)
    .bind(product.price.paise()?)
    .bind(&product.category)
    .bind(&product.product_image)
    .bind(product.stock)
    .bind(&product.created_at)
    .execute(&state.pool)
    .await?;

    tracing::info!(product_id = %product.id, seller = %product.seller_uid, "product created");
    Ok(HttpResponse::Created().json(product))
}

async fn owned_product(state: &AppState, seller_uid: &str, product_id: &str) -> Result<Product, AppError> {
    let mut conn = state.pool.acquire().await?;
    let product = carts::find_product(&mut conn, product_id)
        .await?
        .ok_or_else(|| AppError::not_found("product"))?;
    if product.seller_uid != seller_uid {
        return Err(AppError::Forbidden("product belongs to another seller".to_string()));
    }
    Ok(product)
}

pub async fn update_product(
    identity: Identity,
    path: web::Path<String>,
    data: web::Json<UpdateProductRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let seller = identity.require(&state.pool, &[Role::Seller]).await?;
    let mut product = owned_product(&state, &seller.uid, &path.into_inner()).await?;
    data.into_inner().apply(&mut product).map_err(AppError::BadRequest)?;

    sqlx::query(
        "UPDATE products SET name = ?, price = ?, category = ?, product_image = ?, stock = ? WHERE id = ?",
    )
    .bind(&product.name)
    .bind(product.price.paise()?)
    .bind(&product.category)
    .bind(&product.product_image)
    .bind(product.stock)
    .bind(&product.id)
    .execute(&state.pool)
    .await?;

    Ok(HttpResponse::Ok().json(product))
}

pub async fn delete_product(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let seller = identity.require(&state.pool, &[Role::Seller]).await?;
    let product = owned_product(&state, &seller.uid, &path.into_inner()).await?;

    let mut tx = state.pool.begin().await?;
    // Carts keep a snapshot; drop lines that point at a product that no longer exists.
    let affected = sqlx::query("DELETE FROM cart_items WHERE product_id = ?")
        .bind(&product.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(&product.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(product_id = %product.id, cart_lines_removed = affected, "product deleted");
    Ok(HttpResponse::Ok().json(json!({ "status": "deleted", "id": product.id })))
}

pub async fn list_categories(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let rows = sqlx::query("SELECT DISTINCT category FROM products ORDER BY category")
        .fetch_all(&state.pool)
        .await?;
    let categories = rows
        .iter()
        .map(|r| r.try_get::<String, _>("category"))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HttpResponse::Ok().json(json!({ "categories": categories })))
}
