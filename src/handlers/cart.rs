use actix_web::{web, HttpResponse};

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::{AddCartItemRequest, CartError, QuoteRequest, Role, UpdateQuantityRequest};
use crate::pricing;
use crate::services::carts;
use crate::state::AppState;

pub async fn get_cart(identity: Identity, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user = identity.require(&state.pool, &[Role::Customer]).await?;
    let mut conn = state.pool.acquire().await?;
    let cart = carts::load(&mut conn, &user.uid).await?;
    Ok(HttpResponse::Ok().json(cart))
}

pub async fn add_item(
    identity: Identity,
    data: web::Json<AddCartItemRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = identity.require(&state.pool, &[Role::Customer]).await?;
    let req = data.into_inner();
    if req.quantity == 0 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }

    let mut tx = state.pool.begin().await?;
    let product = carts::find_product(&mut tx, &req.product_id)
        .await?
        .ok_or_else(|| AppError::not_found("product"))?;

    let mut cart = carts::load(&mut tx, &user.uid).await?;
    let wanted = cart
        .quantity_of(&product.id)
        .checked_add(req.quantity)
        .ok_or(CartError::InvalidQuantity)?;
    if wanted > product.stock {
        return Err(AppError::Conflict(format!(
            "only {} of {} in stock",
            product.stock, product.name
        )));
    }

    cart.add_item(product.to_cart_item(req.quantity))?;
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;

    tracing::debug!(uid = %user.uid, product_id = %product.id, quantity = wanted, "cart item added");
    Ok(HttpResponse::Ok().json(cart))
}

pub async fn update_quantity(
    identity: Identity,
    path: web::Path<String>,
    data: web::Json<UpdateQuantityRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = identity.require(&state.pool, &[Role::Customer]).await?;
    let product_id = path.into_inner();
    let quantity = data.quantity;

    let mut tx = state.pool.begin().await?;
    let mut cart = carts::load(&mut tx, &user.uid).await?;

    if quantity > 0 {
        if let Some(product) = carts::find_product(&mut tx, &product_id).await? {
            if quantity > product.stock {
                return Err(AppError::Conflict(format!(
                    "only {} of {} in stock",
                    product.stock, product.name
                )));
            }
        }
    }

    cart.update_quantity(&product_id, quantity)?;
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(cart))
}

pub async fn remove_item(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = identity.require(&state.pool, &[Role::Customer]).await?;
    let product_id = path.into_inner();

    let mut tx = state.pool.begin().await?;
    let mut cart = carts::load(&mut tx, &user.uid).await?;
    cart.remove_item(&product_id)?;
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(cart))
}

pub async fn clear_cart(identity: Identity, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user = identity.require(&state.pool, &[Role::Customer]).await?;

    let mut tx = state.pool.begin().await?;
    let mut cart = carts::load(&mut tx, &user.uid).await?;
    cart.clear()?;
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(cart))
}

/// Fee breakdown for an arbitrary subtotal, for previews before anything is in the cart.
pub async fn quote(data: web::Json<QuoteRequest>) -> Result<HttpResponse, AppError> {
    let breakdown = pricing::quote(data.subtotal)?;
    Ok(HttpResponse::Ok().json(breakdown))
}
