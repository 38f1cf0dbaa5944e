//! Wallet balances and their transaction log.
//!
//! Callers pass the connection of an open transaction so the balance update and the
//! log row land together, alongside whatever else the caller changes (orders, stock).

use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Money, TransactionKind, Wallet, WalletTransaction};

/// Returns the wallet for `uid`, creating an empty one on first use.
pub async fn wallet(conn: &mut SqliteConnection, uid: &str) -> Result<Wallet, AppError> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("INSERT OR IGNORE INTO wallets (uid, balance, updated_at) VALUES (?, 0, ?)")
        .bind(uid)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query("SELECT uid, balance, updated_at FROM wallets WHERE uid = ?")
        .bind(uid)
        .fetch_one(&mut *conn)
        .await?;

    Ok(Wallet {
        uid: row.try_get("uid")?,
        balance: Money::from_paise(row.try_get("balance")?),
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn post(
    conn: &mut SqliteConnection,
    uid: &str,
    kind: TransactionKind,
    amount: Money,
    description: &str,
    reference: Option<&str>,
) -> Result<WalletTransaction, AppError> {
    let current = wallet(conn, uid).await?;
    let balance_after = kind.apply(current.balance, amount)?;
    let stored_amount = amount.paise()?;
    let stored_balance = balance_after.paise()?;
    let now = Utc::now().to_rfc3339();

    sqlx::query("UPDATE wallets SET balance = ?, updated_at = ? WHERE uid = ?")
        .bind(stored_balance)
        .bind(&now)
        .bind(uid)
        .execute(&mut *conn)
        .await?;

    let seq: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(seq), 0) + 1 FROM wallet_transactions WHERE uid = ?",
    )
    .bind(uid)
    .fetch_one(&mut *conn)
    .await?;

    let transaction = WalletTransaction {
        id: Uuid::new_v4().to_string(),
        uid: uid.to_string(),
        kind,
        amount,
        balance_after,
        description: description.to_string(),
        reference: reference.map(str::to_string),
        created_at: now,
    };

    sqlx::query(
        "INSERT INTO wallet_transactions (id, uid, kind, amount, balance_after, description, reference, created_at, seq) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&transaction.id)
    .bind(&transaction.uid)
    .bind(kind.as_str())
    .bind(stored_amount)
    .bind(stored_balance)
    .bind(&transaction.description)
    .bind(&transaction.reference)
    .bind(&transaction.created_at)
    .bind(seq)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        uid,
        kind = kind.as_str(),
        amount = %amount,
        balance = %balance_after,
        "wallet transaction posted"
    );

    Ok(transaction)
}

pub async fn transactions(
    conn: &mut SqliteConnection,
    uid: &str,
    limit: i64,
) -> Result<Vec<WalletTransaction>, AppError> {
    let rows = sqlx::query(
        "SELECT id, uid, kind, amount, balance_after, description, reference, created_at \
         FROM wallet_transactions WHERE uid = ? ORDER BY seq DESC LIMIT ?",
    )
    .bind(uid)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| WalletTransaction::from_row(row).map_err(AppError::from))
        .collect()
}
