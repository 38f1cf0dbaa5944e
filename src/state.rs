use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::TokenKeys;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub keys: TokenKeys,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig) -> Self {
        let keys = TokenKeys::from_secret(config.jwt_secret.as_bytes());
        Self {
            pool,
            config: Arc::new(config),
            keys,
        }
    }
}
