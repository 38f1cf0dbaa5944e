use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::{AmountRequest, Role, TransactionKind};
use crate::services::ledger;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

fn history_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

pub async fn get_wallet(identity: Identity, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user = identity.user(&state.pool).await?;
    let mut conn = state.pool.acquire().await?;
    let wallet = ledger::wallet(&mut conn, &user.uid).await?;
    Ok(HttpResponse::Ok().json(wallet))
}

pub async fn list_transactions(
    identity: Identity,
    query: web::Query<HistoryQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = identity.user(&state.pool).await?;
    let mut conn = state.pool.acquire().await?;
    let transactions = ledger::transactions(&mut conn, &user.uid, history_limit(query.limit)).await?;
    Ok(HttpResponse::Ok().json(json!({ "count": transactions.len(), "transactions": transactions })))
}

pub async fn top_up(
    identity: Identity,
    data: web::Json<AmountRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = identity.require(&state.pool, &[Role::Customer]).await?;

    let mut tx = state.pool.begin().await?;
    let transaction = ledger::post(
        &mut tx,
        &user.uid,
        TransactionKind::Credit,
        data.amount,
        "Wallet top-up",
        None,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(transaction))
}

pub async fn withdraw(
    identity: Identity,
    data: web::Json<AmountRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = identity.require(&state.pool, &[Role::Seller, Role::Delivery]).await?;

    let mut tx = state.pool.begin().await?;
    let transaction = ledger::post(
        &mut tx,
        &user.uid,
        TransactionKind::Debit,
        data.amount,
        "Withdrawal to bank account",
        None,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(transaction))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_limit_is_clamped() {
        assert_eq!(history_limit(None), 50);
        assert_eq!(history_limit(Some(0)), 1);
        assert_eq!(history_limit(Some(-5)), 1);
        assert_eq!(history_limit(Some(20)), 20);
        assert_eq!(history_limit(Some(10_000)), 200);
    }
}
