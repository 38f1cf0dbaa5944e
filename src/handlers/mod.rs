pub mod auth;
pub mod branches;
pub mod cart;
pub mod delivery;
pub mod orders;
pub mod products;
pub mod wallet;

use actix_web::{error, web, HttpResponse};
use serde_json::json;

use crate::error::AppError;

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Malformed bodies and query strings get the same `{"error": ...}` shape as handler errors.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| error::Error::from(AppError::BadRequest(err.to_string())))
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| error::Error::from(AppError::BadRequest(err.to_string())))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/api/auth")
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .route("/refresh-token", web::post().to(auth::refresh_token))
                .route("/logout", web::post().to(auth::logout))
                .route("/check-user", web::get().to(auth::email_exists)),
        )
        .service(
            web::scope("/api/users")
                .route("/me", web::get().to(auth::get_me))
                .route("/me", web::put().to(auth::update_me))
                .route("/{uid}", web::get().to(auth::get_profile)),
        )
        .service(
            web::scope("/api/cart")
                .route("", web::get().to(cart::get_cart))
                .route("", web::delete().to(cart::clear_cart))
                .route("/quote", web::post().to(cart::quote))
                .route("/items", web::post().to(cart::add_item))
                .route("/items/{product_id}", web::put().to(cart::update_quantity))
                .route("/items/{product_id}", web::delete().to(cart::remove_item)),
        )
        .service(
            web::scope("/api/products")
                .route("", web::get().to(products::list_products))
                .route("", web::post().to(products::create_product))
                .route("/categories", web::get().to(products::list_categories))
                .route("/{id}", web::get().to(products::get_product))
                .route("/{id}", web::put().to(products::update_product))
                .route("/{id}", web::delete().to(products::delete_product)),
        )
        .service(
            web::scope("/api/branches")
                .route("", web::get().to(branches::list_branches))
                .route("/requests", web::get().to(branches::list_requests))
                .route("/requests", web::post().to(branches::create_request))
                .route("/requests/{id}/accept", web::post().to(branches::accept_request))
                .route("/requests/{id}/deny", web::post().to(branches::deny_request))
                .route("/{branch_uid}", web::delete().to(branches::unlink_branch)),
        )
        .service(
            web::scope("/api/delivery-verification")
                .route("", web::post().to(delivery::submit))
                .route("/me", web::get().to(delivery::get_mine)),
        )
        .service(
            web::scope("/api/admin/delivery-verifications")
                .route("", web::get().to(delivery::list_for_admin))
                .route("/{uid}/review", web::post().to(delivery::review)),
        )
        .service(
            web::scope("/api/wallet")
                .route("", web::get().to(wallet::get_wallet))
                .route("/transactions", web::get().to(wallet::list_transactions))
                .route("/top-up", web::post().to(wallet::top_up))
                .route("/withdraw", web::post().to(wallet::withdraw)),
        )
        .service(
            web::scope("/api/orders")
                .route("", web::post().to(orders::place_order))
                .route("", web::get().to(orders::list_orders))
                .route("/available", web::get().to(orders::available_orders))
                .route("/{id}", web::get().to(orders::get_order))
                .route("/{id}/cancel", web::post().to(orders::cancel_order))
                .route("/{id}/pickup", web::post().to(orders::pickup_order))
                .route("/{id}/deliver", web::post().to(orders::deliver_order)),
        );
}
