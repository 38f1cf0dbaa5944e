use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::AppError;
use crate::handlers::delivery::is_approved;
use crate::models::order::ORDER_COLUMNS;
use crate::models::{
    Money, Order, OrderAction, OrderItem, OrderStatus, PaymentMethod, PlaceOrderRequest, Role,
    TransactionKind, User,
};
use crate::pricing;
use crate::services::{carts, ledger};
use crate::state::AppState;

async fn find_order(conn: &mut SqliteConnection, id: &str) -> Result<Order, AppError> {
    let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;
    Ok(Order::from_row(&row)?)
}

async fn save_status(conn: &mut SqliteConnection, order: &Order) -> Result<(), AppError> {
    sqlx::query("UPDATE orders SET status = ?, delivery_partner_uid = ?, updated_at = ? WHERE id = ?")
        .bind(order.status.as_str())
        .bind(&order.delivery_partner_uid)
        .bind(&order.updated_at)
        .bind(&order.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn can_view(user: &User, order: &Order) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Customer => order.customer_uid == user.uid,
        Role::Delivery => order.delivery_partner_uid.as_deref() == Some(user.uid.as_str()),
        Role::Seller => order.items.iter().any(|item| item.seller_uid == user.uid),
    }
}

pub async fn place_order(
    identity: Identity,
    data: web::Json<PlaceOrderRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let customer = identity.require(&state.pool, &[Role::Customer]).await?;
    let req = data.into_inner();
    let delivery_address = req.delivery_address.trim().to_string();
    if delivery_address.is_empty() {
        return Err(AppError::BadRequest("deliveryAddress is required".to_string()));
    }

    let mut tx = state.pool.begin().await?;
    let mut cart = carts::load(&mut tx, &customer.uid).await?;
    if cart.is_empty() {
        return Err(AppError::BadRequest("cart is empty".to_string()));
    }

    let mut items = Vec::with_capacity(cart.items.len());
    for line in &cart.items {
        let product = carts::find_product(&mut tx, &line.product_id)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("{} is no longer available", line.product_name)))?;
        if line.quantity > product.stock {
            return Err(AppError::Conflict(format!(
                "only {} of {} in stock",
                product.stock, product.name
            )));
        }
        sqlx::query("UPDATE products SET stock = stock - ? WHERE id = ?")
            .bind(line.quantity)
            .bind(&product.id)
            .execute(&mut *tx)
            .await?;
        items.push(OrderItem {
            product_id: product.id,
            seller_uid: product.seller_uid,
            product_name: product.name,
            price: product.price,
            quantity: line.quantity,
            category: product.category,
        });
    }

    let subtotal: Money = items.iter().map(OrderItem::line_total).sum();
    let breakdown = pricing::quote(subtotal)?;
    let now = Utc::now().to_rfc3339();
    let order = Order {
        id: Uuid::new_v4().to_string(),
        customer_uid: customer.uid,
        items,
        subtotal: breakdown.subtotal,
        delivery_fee: breakdown.delivery_fee,
        total_amount: breakdown.total_amount,
        payment_method: req.payment_method,
        status: OrderStatus::Placed,
        delivery_address,
        delivery_partner_uid: None,
        created_at: now.clone(),
        updated_at: now,
    };

    if order.payment_method == PaymentMethod::Wallet {
        ledger::post(
            &mut tx,
            &order.customer_uid,
            TransactionKind::Debit,
            order.total_amount,
            "Order payment",
            Some(&order.id),
        )
        .await?;
    }

    sqlx::query(&format!(
        "INSERT INTO orders ({ORDER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&order.id)
    .bind(&order.customer_uid)
    .bind(serde_json::to_string(&order.items)?)
    .bind(order.subtotal.paise()?)
    .bind(order.delivery_fee.paise()?)
    .bind(order.total_amount.paise()?)
    .bind(order.payment_method.as_str())
    .bind(order.status.as_str())
    .bind(&order.delivery_address)
    .bind(&order.delivery_partner_uid)
    .bind(&order.created_at)
    .bind(&order.updated_at)
    .execute(&mut *tx)
    .await?;

    cart.clear()?;
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        customer = %order.customer_uid,
        total = %order.total_amount,
        payment = order.payment_method.as_str(),
        "order placed"
    );
    Ok(HttpResponse::Created().json(order))
}

pub async fn list_orders(identity: Identity, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user = identity.require(&state.pool, &[Role::Customer, Role::Delivery]).await?;
    let column = match user.role {
        Role::Delivery => "delivery_partner_uid",
        _ => "customer_uid",
    };

    let rows = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE {column} = ? ORDER BY created_at DESC"
    ))
    .bind(&user.uid)
    .fetch_all(&state.pool)
    .await?;
    let orders = rows.iter().map(Order::from_row).collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(json!({ "count": orders.len(), "orders": orders })))
}

pub async fn available_orders(identity: Identity, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let partner = identity.require(&state.pool, &[Role::Delivery]).await?;
    let mut conn = state.pool.acquire().await?;
    if !is_approved(&mut conn, &partner.uid).await? {
        return Err(AppError::Forbidden("delivery partner is not verified".to_string()));
    }

    let rows = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE status = 'placed' ORDER BY created_at"
    ))
    .fetch_all(&mut *conn)
    .await?;
    let orders = rows.iter().map(Order::from_row).collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(json!({ "count": orders.len(), "orders": orders })))
}

pub async fn get_order(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = identity.user(&state.pool).await?;
    let mut conn = state.pool.acquire().await?;
    let order = find_order(&mut conn, &path.into_inner()).await?;
    if !can_view(&user, &order) {
        return Err(AppError::not_found("order"));
    }
    Ok(HttpResponse::Ok().json(order))
}

pub async fn cancel_order(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let customer = identity.require(&state.pool, &[Role::Customer]).await?;

    let mut tx = state.pool.begin().await?;
    let mut order = find_order(&mut tx, &path.into_inner()).await?;
    if order.customer_uid != customer.uid {
        return Err(AppError::not_found("order"));
    }
    order.status = order.status.apply(OrderAction::Cancel)?;
    order.updated_at = Utc::now().to_rfc3339();

    for item in &order.items {
        // The product may have been deleted since; nothing to restore then.
        sqlx::query("UPDATE products SET stock = stock + ? WHERE id = ?")
            .bind(item.quantity)
            .bind(&item.product_id)
            .execute(&mut *tx)
            .await?;
    }
    if order.payment_method == PaymentMethod::Wallet {
        ledger::post(
            &mut tx,
            &order.customer_uid,
            TransactionKind::Credit,
            order.total_amount,
            "Refund for cancelled order",
            Some(&order.id),
        )
        .await?;
    }
    save_status(&mut tx, &order).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, "order cancelled");
    Ok(HttpResponse::Ok().json(order))
}

pub async fn pickup_order(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let partner = identity.require(&state.pool, &[Role::Delivery]).await?;

    let mut tx = state.pool.begin().await?;
    if !is_approved(&mut tx, &partner.uid).await? {
        return Err(AppError::Forbidden("delivery partner is not verified".to_string()));
    }
    let mut order = find_order(&mut tx, &path.into_inner()).await?;
    order.status = order.status.apply(OrderAction::Pickup)?;
    order.delivery_partner_uid = Some(partner.uid);
    order.updated_at = Utc::now().to_rfc3339();
    save_status(&mut tx, &order).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, partner = ?order.delivery_partner_uid, "order picked up");
    Ok(HttpResponse::Ok().json(order))
}

pub async fn deliver_order(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let partner = identity.require(&state.pool, &[Role::Delivery]).await?;

    let mut tx = state.pool.begin().await?;
    let mut order = find_order(&mut tx, &path.into_inner()).await?;
    if order.delivery_partner_uid.as_deref() != Some(partner.uid.as_str()) {
        return Err(AppError::Forbidden("order is assigned to another partner".to_string()));
    }
    order.status = order.status.apply(OrderAction::Deliver)?;
    order.updated_at = Utc::now().to_rfc3339();

    for (seller_uid, amount) in order.seller_payouts() {
        if amount.is_positive() {
            ledger::post(&mut tx, &seller_uid, TransactionKind::Credit, amount, "Order payout", Some(&order.id))
                .await?;
        }
    }
    if order.delivery_fee.is_positive() {
        ledger::post(
            &mut tx,
            &partner.uid,
            TransactionKind::Credit,
            order.delivery_fee,
            "Delivery fee",
            Some(&order.id),
        )
        .await?;
    }
    save_status(&mut tx, &order).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, partner = %partner.uid, "order delivered");
    Ok(HttpResponse::Ok().json(order))
}
