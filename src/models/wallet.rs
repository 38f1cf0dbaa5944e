use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use crate::models::Money;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("insufficient balance: {balance} available, {requested} requested")]
    InsufficientFunds { balance: Money, requested: Money },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }

    /// Balance after applying `amount` of this kind.
    pub fn apply(self, balance: Money, amount: Money) -> Result<Money, WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::NonPositiveAmount);
        }
        match self {
            TransactionKind::Credit => Ok(balance + amount),
            TransactionKind::Debit if amount > balance => Err(WalletError::InsufficientFunds {
                balance,
                requested: amount,
            }),
            TransactionKind::Debit => Ok(balance - amount),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionKind::Credit),
            "debit" => Ok(TransactionKind::Debit),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub uid: String,
    pub balance: Money,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: String,
    pub uid: String,
    pub kind: TransactionKind,
    pub amount: Money,
    pub balance_after: Money,
    pub description: String,
    pub reference: Option<String>,
    pub created_at: String,
}

impl WalletTransaction {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        Ok(WalletTransaction {
            id: row.try_get("id")?,
            uid: row.try_get("uid")?,
            kind: kind.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            amount: Money::from_paise(row.try_get("amount")?),
            balance_after: Money::from_paise(row.try_get("balance_after")?),
            description: row.try_get("description")?,
            reference: row.try_get("reference")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_adds_to_balance() {
        let balance = TransactionKind::Credit.apply(Money::rupees(10), Money::rupees(5)).unwrap();
        assert_eq!(balance, Money::rupees(15));
    }

    #[test]
    fn debit_cannot_overdraw() {
        assert_eq!(
            TransactionKind::Debit.apply(Money::rupees(10), Money::rupees(11)),
            Err(WalletError::InsufficientFunds {
                balance: Money::rupees(10),
                requested: Money::rupees(11),
            })
        );
        assert_eq!(
            TransactionKind::Debit.apply(Money::rupees(10), Money::rupees(10)).unwrap(),
            Money::ZERO
        );
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        assert_eq!(
            TransactionKind::Credit.apply(Money::ZERO, Money::ZERO),
            Err(WalletError::NonPositiveAmount)
        );
        assert_eq!(
            TransactionKind::Credit.apply(Money::ZERO, Money::from_paise(-100)),
            Err(WalletError::NonPositiveAmount)
        );
    }
}
