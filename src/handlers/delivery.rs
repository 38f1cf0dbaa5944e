use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::delivery::VERIFICATION_COLUMNS;
use crate::models::{DeliveryDocuments, DeliveryVerification, ReviewRequest, Role, VerificationStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<VerificationStatus>,
}

async fn find_verification(
    conn: &mut sqlx::SqliteConnection,
    uid: &str,
) -> Result<Option<DeliveryVerification>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {VERIFICATION_COLUMNS} FROM delivery_verifications WHERE uid = ?"
    ))
    .bind(uid)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.as_ref().map(DeliveryVerification::from_row).transpose()?)
}

/// Whether `uid` is an approved delivery partner.
pub(crate) async fn is_approved(conn: &mut sqlx::SqliteConnection, uid: &str) -> Result<bool, AppError> {
    let status = find_verification(conn, uid).await?.map(|v| v.status);
    Ok(status == Some(VerificationStatus::Approved))
}

pub async fn submit(
    identity: Identity,
    data: web::Json<DeliveryDocuments>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let partner = identity.require(&state.pool, &[Role::Delivery]).await?;
    let documents = data.into_inner();
    documents.validate().map_err(AppError::BadRequest)?;

    let mut tx = state.pool.begin().await?;
    let current = find_verification(&mut tx, &partner.uid).await?;
    VerificationStatus::check_submission(current.map(|v| v.status))?;

    let verification = DeliveryVerification {
        uid: partner.uid,
        documents,
        status: VerificationStatus::Pending,
        admin_note: None,
        submitted_at: Utc::now().to_rfc3339(),
        reviewed_at: None,
    };

    sqlx::query(&format!(
        "INSERT OR REPLACE INTO delivery_verifications ({VERIFICATION_COLUMNS}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&verification.uid)
    .bind(&verification.documents.license_front)
    .bind(&verification.documents.license_back)
    .bind(&verification.documents.vehicle_front)
    .bind(&verification.documents.vehicle_back)
    .bind(&verification.documents.rc_image)
    .bind(verification.status.as_str())
    .bind(&verification.admin_note)
    .bind(&verification.submitted_at)
    .bind(&verification.reviewed_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(uid = %verification.uid, "delivery documents submitted");
    Ok(HttpResponse::Created().json(verification))
}

pub async fn get_mine(identity: Identity, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let partner = identity.require(&state.pool, &[Role::Delivery]).await?;
    let mut conn = state.pool.acquire().await?;
    let verification = find_verification(&mut conn, &partner.uid)
        .await?
        .ok_or_else(|| AppError::not_found("verification"))?;
    Ok(HttpResponse::Ok().json(verification))
}

pub async fn list_for_admin(
    identity: Identity,
    query: web::Query<StatusFilter>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    identity.require(&state.pool, &[Role::Admin]).await?;
    let status = query.status.map(|s| s.as_str());

    let rows = sqlx::query(&format!(
        "SELECT {VERIFICATION_COLUMNS} FROM delivery_verifications \
         WHERE (? IS NULL OR status = ?) ORDER BY submitted_at"
    ))
    .bind(status)
    .bind(status)
    .fetch_all(&state.pool)
    .await?;
    let verifications = rows
        .iter()
        .map(DeliveryVerification::from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(json!({ "count": verifications.len(), "verifications": verifications })))
}

pub async fn review(
    identity: Identity,
    path: web::Path<String>,
    data: web::Json<ReviewRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let admin = identity.require(&state.pool, &[Role::Admin]).await?;
    let uid = path.into_inner();
    let req = data.into_inner();

    let mut tx = state.pool.begin().await?;
    let mut verification = find_verification(&mut tx, &uid)
        .await?
        .ok_or_else(|| AppError::not_found("verification"))?;

    verification.status = verification.status.apply(req.action, req.note.as_deref())?;
    verification.admin_note = req
        .note
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .or(verification.admin_note);
    verification.reviewed_at = Some(Utc::now().to_rfc3339());

    sqlx::query("UPDATE delivery_verifications SET status = ?, admin_note = ?, reviewed_at = ? WHERE uid = ?")
        .bind(verification.status.as_str())
        .bind(&verification.admin_note)
        .bind(&verification.reviewed_at)
        .bind(&verification.uid)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(
        uid = %verification.uid,
        admin = %admin.uid,
        status = %verification.status,
        "delivery verification reviewed"
    );
    Ok(HttpResponse::Ok().json(verification))
}
