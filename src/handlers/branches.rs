use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::branch::LINK_REQUEST_COLUMNS;
use crate::models::{
    BranchLinkRequest, BranchStore, CreateLinkRequest, LinkDecision, LinkStatus, Role,
};
use crate::state::AppState;

pub async fn create_request(
    identity: Identity,
    data: web::Json<CreateLinkRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let seller = identity.require(&state.pool, &[Role::Seller]).await?;
    let req = data.into_inner();
    let branch_name = req.branch_name.trim();
    if branch_name.is_empty() {
        return Err(AppError::BadRequest("branchName is required".to_string()));
    }

    let mut tx = state.pool.begin().await?;

    let target_uid: String = sqlx::query_scalar(
        "SELECT uid FROM users WHERE seller_unique_number = ? AND role = 'seller'",
    )
    .bind(req.main_seller_number.trim())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("seller"))?;

    if target_uid == seller.uid {
        return Err(AppError::BadRequest("a store cannot be its own branch".to_string()));
    }

    let already_branch: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM branch_stores WHERE branch_uid = ?")
            .bind(&seller.uid)
            .fetch_one(&mut *tx)
            .await?;
    if already_branch > 0 {
        return Err(AppError::Conflict("this store is already linked as a branch".to_string()));
    }

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM branch_link_requests \
         WHERE status = 'pending' AND ((requester_uid = ? AND target_uid = ?) OR (requester_uid = ? AND target_uid = ?))",
    )
    .bind(&seller.uid)
    .bind(&target_uid)
    .bind(&target_uid)
    .bind(&seller.uid)
    .fetch_one(&mut *tx)
    .await?;
    if pending > 0 {
        return Err(AppError::Conflict("a pending request already exists".to_string()));
    }

    let request = BranchLinkRequest {
        id: Uuid::new_v4().to_string(),
        requester_uid: seller.uid,
        target_uid,
        branch_name: branch_name.to_string(),
        status: LinkStatus::Pending,
        created_at: Utc::now().to_rfc3339(),
        responded_at: None,
    };

    sqlx::query(&format!(
        "INSERT INTO branch_link_requests ({LINK_REQUEST_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&request.id)
    .bind(&request.requester_uid)
    .bind(&request.target_uid)
    .bind(&request.branch_name)
    .bind(request.status.as_str())
    .bind(&request.created_at)
    .bind(&request.responded_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(
        request_id = %request.id,
        requester = %request.requester_uid,
        target = %request.target_uid,
        "branch link requested"
    );
    Ok(HttpResponse::Created().json(request))
}

pub async fn list_requests(identity: Identity, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let seller = identity.require(&state.pool, &[Role::Seller]).await?;

    let rows = sqlx::query(&format!(
        "SELECT {LINK_REQUEST_COLUMNS} FROM branch_link_requests \
         WHERE requester_uid = ? OR target_uid = ? ORDER BY created_at DESC"
    ))
    .bind(&seller.uid)
    .bind(&seller.uid)
    .fetch_all(&state.pool)
    .await?;

    let requests = rows
        .iter()
        .map(BranchLinkRequest::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let (incoming, outgoing): (Vec<_>, Vec<_>) =
        requests.into_iter().partition(|r| r.target_uid == seller.uid);

    Ok(HttpResponse::Ok().json(json!({ "incoming": incoming, "outgoing": outgoing })))
}

async fn respond(
    identity: Identity,
    request_id: String,
    decision: LinkDecision,
    state: &AppState,
) -> Result<HttpResponse, AppError> {
    let seller = identity.require(&state.pool, &[Role::Seller]).await?;
    let mut tx = state.pool.begin().await?;

    let row = sqlx::query(&format!(
        "SELECT {LINK_REQUEST_COLUMNS} FROM branch_link_requests WHERE id = ?"
    ))
    .bind(&request_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("link request"))?;
    let mut request = BranchLinkRequest::from_row(&row)?;

    if request.target_uid != seller.uid {
        return Err(AppError::Forbidden("only the addressed seller can respond".to_string()));
    }

    request.status = request.status.respond(decision)?;
    let now = Utc::now().to_rfc3339();
    request.responded_at = Some(now.clone());

    sqlx::query("UPDATE branch_link_requests SET status = ?, responded_at = ? WHERE id = ?")
        .bind(request.status.as_str())
        .bind(&now)
        .bind(&request.id)
        .execute(&mut *tx)
        .await?;

    if request.status == LinkStatus::Accepted {
        let already_branch: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM branch_stores WHERE branch_uid = ?")
                .bind(&request.requester_uid)
                .fetch_one(&mut *tx)
                .await?;
        if already_branch > 0 {
            return Err(AppError::Conflict(
                "the requesting store has been linked elsewhere".to_string(),
            ));
        }
        sqlx::query(
            "INSERT INTO branch_stores (branch_uid, main_uid, branch_name, linked_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&request.requester_uid)
        .bind(&request.target_uid)
        .bind(&request.branch_name)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(request_id = %request.id, status = request.status.as_str(), "branch link answered");
    Ok(HttpResponse::Ok().json(request))
}

pub async fn accept_request(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    respond(identity, path.into_inner(), LinkDecision::Accept, &state).await
}

pub async fn deny_request(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    respond(identity, path.into_inner(), LinkDecision::Deny, &state).await
}

pub async fn list_branches(identity: Identity, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let seller = identity.require(&state.pool, &[Role::Seller]).await?;

    let rows = sqlx::query(
        "SELECT main_uid, branch_uid, branch_name, linked_at FROM branch_stores WHERE main_uid = ? ORDER BY linked_at",
    )
    .bind(&seller.uid)
    .fetch_all(&state.pool)
    .await?;
    let branches = rows
        .iter()
        .map(BranchStore::from_row)
        .collect::<Result<Vec<_>, _>>()?;

    let main_store = sqlx::query(
        "SELECT main_uid, branch_uid, branch_name, linked_at FROM branch_stores WHERE branch_uid = ?",
    )
    .bind(&seller.uid)
    .fetch_optional(&state.pool)
    .await?
    .as_ref()
    .map(BranchStore::from_row)
    .transpose()?;

    Ok(HttpResponse::Ok().json(json!({ "branches": branches, "mainStore": main_store })))
}

pub async fn unlink_branch(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let seller = identity.require(&state.pool, &[Role::Seller]).await?;
    let branch_uid = path.into_inner();

    let result = sqlx::query("DELETE FROM branch_stores WHERE branch_uid = ? AND main_uid = ?")
        .bind(&branch_uid)
        .bind(&seller.uid)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("branch"));
    }

    tracing::info!(main = %seller.uid, branch = %branch_uid, "branch unlinked");
    Ok(HttpResponse::Ok().json(json!({ "status": "unlinked", "branchUid": branch_uid })))
}
