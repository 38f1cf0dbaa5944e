use actix_cors::Cors;
use actix_web::middleware::{Logger, NormalizePath};
use actix_web::{web, App, HttpServer};
use tracing_subscriber::EnvFilter;

use freshcart::config::load_app_config;
use freshcart::state::AppState;
use freshcart::{db, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = load_app_config().map_err(std::io::Error::other)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .map_err(std::io::Error::other)?;

    let bind_addr = config.bind_addr;
    tracing::info!(%bind_addr, env = ?config.env, "starting freshcart backend");
    if config.allow_uid_header {
        tracing::warn!("x-uid header authentication is enabled");
    }

    let app_state = web::Data::new(AppState::new(pool, config));

    HttpServer::new(move || {
        App::new()
            .wrap(NormalizePath::trim())
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .app_data(app_state.clone())
            .configure(handlers::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
