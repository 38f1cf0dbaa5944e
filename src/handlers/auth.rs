use actix_web::{web, HttpResponse};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{self, Identity, RefreshRequest, TokenPair};
use crate::error::AppError;
use crate::models::user::{validate_details, USER_COLUMNS};
use crate::models::{
    LoginRequest, PublicProfile, RegisterRequest, Role, UpdateProfileRequest, User,
};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    message: &'static str,
    user: User,
    #[serde(flatten)]
    tokens: TokenPair,
}

#[derive(Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

fn seller_number_candidate() -> String {
    format!("FC{:06}", rand::rng().random_range(0..1_000_000u32))
}

async fn unique_seller_number(state: &AppState) -> Result<String, AppError> {
    for _ in 0..8 {
        let candidate = seller_number_candidate();
        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE seller_unique_number = ?")
                .bind(&candidate)
                .fetch_one(&state.pool)
                .await?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal("could not allocate a seller number".to_string()))
}

pub async fn register(
    data: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = data.into_inner();
    let pool = &state.pool;

    if req.uid.trim().is_empty() || req.name.trim().is_empty() {
        return Err(AppError::BadRequest("uid and name are required".to_string()));
    }
    if !req.email.contains('@') {
        return Err(AppError::BadRequest("a valid email is required".to_string()));
    }
    if req.role == Role::Admin {
        return Err(AppError::Forbidden("admin accounts cannot be self-registered".to_string()));
    }
    validate_details(req.role, &req.details).map_err(AppError::BadRequest)?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE uid = ? OR email = ?")
        .bind(&req.uid)
        .bind(&req.email)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let seller_unique_number = match req.role {
        Role::Seller => Some(unique_seller_number(&state).await?),
        _ => None,
    };

    let user = User {
        uid: req.uid,
        email: req.email,
        name: req.name.trim().to_string(),
        role: req.role,
        email_verified: req.email_verified,
        provider: req.provider,
        profile_picture: req.profile_picture,
        seller_unique_number,
        details: req.details,
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(&format!(
        "INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&user.uid)
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.role.as_str())
    .bind(user.email_verified)
    .bind(&user.provider)
    .bind(&user.profile_picture)
    .bind(&user.seller_unique_number)
    .bind(serde_json::to_string(&user.details)?)
    .bind(&user.created_at)
    .execute(pool)
    .await?;

    tracing::info!(uid = %user.uid, role = %user.role, "user registered");

    let tokens = auth::issue_token_pair(&state, &user).await?;
    Ok(HttpResponse::Created().json(AuthResponse {
        message: "User registered successfully",
        user,
        tokens,
    }))
}

pub async fn login(
    data: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = data.into_inner();

    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ? LIMIT 1"))
        .bind(&req.uid)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;
    let user = User::from_row(&row)?;

    let tokens = auth::issue_token_pair(&state, &user).await?;
    tracing::info!(uid = %user.uid, "user logged in");

    Ok(HttpResponse::Ok().json(AuthResponse {
        message: "Login successful",
        user,
        tokens,
    }))
}

pub async fn refresh_token(
    data: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (user, tokens) = auth::rotate_session(&state, &data.refresh_token).await?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        message: "Token refreshed",
        user,
        tokens,
    }))
}

pub async fn logout(
    data: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let revoked = auth::revoke_session(&state.pool, &data.refresh_token).await?;
    Ok(HttpResponse::Ok().json(json!({ "revoked": revoked })))
}

pub async fn email_exists(
    query: web::Query<EmailQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(&query.email)
        .fetch_one(&state.pool)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "exists": count > 0 })))
}

pub async fn get_me(identity: Identity, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user = identity.user(&state.pool).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn update_me(
    identity: Identity,
    data: web::Json<UpdateProfileRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let mut user = identity.user(&state.pool).await?;
    let req = data.into_inner();

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }
        user.name = name.trim().to_string();
    }
    if req.profile_picture.is_some() {
        user.profile_picture = req.profile_picture;
    }
    if let Some(details) = req.details {
        let mut merged = user.details.clone();
        merged.extend(details);
        validate_details(user.role, &merged).map_err(AppError::BadRequest)?;
        user.details = merged;
    }

    sqlx::query("UPDATE users SET name = ?, profile_picture = ?, details = ? WHERE uid = ?")
        .bind(&user.name)
        .bind(&user.profile_picture)
        .bind(serde_json::to_string(&user.details)?)
        .bind(&user.uid)
        .execute(&state.pool)
        .await?;

    Ok(HttpResponse::Ok().json(user))
}

pub async fn get_profile(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let uid = path.into_inner();
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?"))
        .bind(&uid)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    Ok(HttpResponse::Ok().json(PublicProfile::from(User::from_row(&row)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seller_numbers_have_fixed_shape() {
        for _ in 0..50 {
            let number = seller_number_candidate();
            assert_eq!(number.len(), 8);
            assert!(number.starts_with("FC"));
            assert!(number[2..].chars().all(|c| c.is_ascii_digit()));
        }
    }
}
