//! Session tokens and request identity.
//!
//! Firebase owns credentials; once a client proves who it is there, the backend hands
//! out a short-lived HS256 access token plus an opaque refresh token stored in the
//! `sessions` table. Refresh tokens are single-use: every refresh rotates them.

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::USER_COLUMNS;
use crate::models::{Role, User};
use crate::state::AppState;

pub const UID_HEADER: &str = "x-uid";

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub fn issue_access_token(
    keys: &TokenKeys,
    user: &User,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.uid.clone(),
        role: user.role,
        iat: now,
        exp: now + ttl_secs,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
}

pub fn verify_access_token(
    keys: &TokenKeys,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &keys.decoding, &validation).map(|data| data.claims)
}

async fn insert_session(
    conn: &mut SqliteConnection,
    uid: &str,
    ttl_days: i64,
) -> Result<String, sqlx::Error> {
    let token = Uuid::new_v4().to_string();
    let created_at = Utc::now();
    let expires_at = created_at + Duration::days(ttl_days);

    sqlx::query("INSERT INTO sessions (token, uid, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&token)
        .bind(uid)
        .bind(created_at.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(conn)
        .await?;

    Ok(token)
}

/// Starts a new session for `user`.
pub async fn issue_token_pair(state: &AppState, user: &User) -> Result<TokenPair, AppError> {
    let mut conn = state.pool.acquire().await?;
    let refresh_token = insert_session(&mut conn, &user.uid, state.config.refresh_token_ttl_days).await?;
    let access_token = issue_access_token(&state.keys, user, state.config.access_token_ttl_secs)?;
    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_in: state.config.access_token_ttl_secs,
    })
}

/// Exchanges a refresh token for a new pair, invalidating the old refresh token.
pub async fn rotate_session(state: &AppState, refresh_token: &str) -> Result<(User, TokenPair), AppError> {
    let mut tx = state.pool.begin().await?;

    let row = sqlx::query("SELECT uid, expires_at FROM sessions WHERE token = ?")
        .bind(refresh_token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid refresh token".to_string()))?;

    let uid: String = row.try_get("uid")?;
    let expires_at: String = row.try_get("expires_at")?;

    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(refresh_token)
        .execute(&mut *tx)
        .await?;

    if is_expired(&expires_at) {
        tx.commit().await?;
        return Err(AppError::Unauthorized("refresh token expired".to_string()));
    }

    let user_row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?"))
        .bind(&uid)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))?;
    let user = User::from_row(&user_row)?;

    let new_refresh = insert_session(&mut *tx, &uid, state.config.refresh_token_ttl_days).await?;
    tx.commit().await?;

    let access_token = issue_access_token(&state.keys, &user, state.config.access_token_ttl_secs)?;
    tracing::debug!(uid = %uid, "rotated refresh token");

    Ok((
        user,
        TokenPair {
            access_token,
            refresh_token: new_refresh,
            expires_in: state.config.access_token_ttl_secs,
        },
    ))
}

pub async fn revoke_session(pool: &SqlitePool, refresh_token: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(refresh_token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn is_expired(expires_at: &str) -> bool {
    DateTime::parse_from_rfc3339(expires_at)
        .map(|t| t.with_timezone(&Utc) <= Utc::now())
        .unwrap_or(true)
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The caller of a request, from a bearer access token or the `x-uid` header.
///
/// The role is only known when it came from a token; handlers that need it call
/// [`Identity::require`], which falls back to the stored user.
#[derive(Debug, Clone)]
pub struct Identity {
    pub uid: String,
    pub role: Option<Role>,
}

impl Identity {
    fn from_request_parts(req: &HttpRequest) -> Result<Self, AppError> {
        let state = req
            .app_data::<web::Data<AppState>>()
            .ok_or_else(|| AppError::Internal("application state not configured".to_string()))?;

        if let Some(token) = bearer_token(req) {
            let claims = verify_access_token(&state.keys, token)?;
            return Ok(Identity {
                uid: claims.sub,
                role: Some(claims.role),
            });
        }

        if state.config.allow_uid_header {
            if let Some(uid) = req
                .headers()
                .get(UID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                return Ok(Identity {
                    uid: uid.to_string(),
                    role: None,
                });
            }
        }

        Err(AppError::Unauthorized("authentication required".to_string()))
    }

    pub async fn user(&self, pool: &SqlitePool) -> Result<User, AppError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?"))
            .bind(&self.uid)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::Unauthorized("unknown user".to_string()))?;
        Ok(User::from_row(&row)?)
    }

    /// Loads the caller and checks that their role is one of `roles`.
    pub async fn require(&self, pool: &SqlitePool, roles: &[Role]) -> Result<User, AppError> {
        if let Some(role) = self.role {
            if !roles.contains(&role) {
                return Err(forbidden(roles));
            }
        }
        let user = self.user(pool).await?;
        if !roles.contains(&user.role) {
            return Err(forbidden(roles));
        }
        Ok(user)
    }
}

fn forbidden(roles: &[Role]) -> AppError {
    let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
    AppError::Forbidden(format!("requires role: {}", names.join(" or ")))
}

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Identity::from_request_parts(req))
    }
}
