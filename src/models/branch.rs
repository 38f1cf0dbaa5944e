use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::models::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Pending,
    Accepted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDecision {
    Accept,
    Deny,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Accepted => "accepted",
            LinkStatus::Denied => "denied",
        }
    }

    /// Only pending requests can be answered; accepted and denied are final.
    pub fn respond(self, decision: LinkDecision) -> Result<LinkStatus, TransitionError> {
        match (self, decision) {
            (LinkStatus::Pending, LinkDecision::Accept) => Ok(LinkStatus::Accepted),
            (LinkStatus::Pending, LinkDecision::Deny) => Ok(LinkStatus::Denied),
            (from, decision) => Err(TransitionError::NotAllowed {
                from: from.as_str(),
                action: match decision {
                    LinkDecision::Accept => "accept",
                    LinkDecision::Deny => "deny",
                },
            }),
        }
    }
}

impl FromStr for LinkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LinkStatus::Pending),
            "accepted" => Ok(LinkStatus::Accepted),
            "denied" => Ok(LinkStatus::Denied),
            other => Err(format!("unknown link status: {other}")),
        }
    }
}

/// Invitation from a branch seller to a main seller.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BranchLinkRequest {
    pub id: String,
    pub requester_uid: String,
    pub target_uid: String,
    pub branch_name: String,
    pub status: LinkStatus,
    pub created_at: String,
    pub responded_at: Option<String>,
}

pub(crate) const LINK_REQUEST_COLUMNS: &str =
    "id, requester_uid, target_uid, branch_name, status, created_at, responded_at";

impl BranchLinkRequest {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(BranchLinkRequest {
            id: row.try_get("id")?,
            requester_uid: row.try_get("requester_uid")?,
            target_uid: row.try_get("target_uid")?,
            branch_name: row.try_get("branch_name")?,
            status: status.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            created_at: row.try_get("created_at")?,
            responded_at: row.try_get("responded_at")?,
        })
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BranchStore {
    pub main_uid: String,
    pub branch_uid: String,
    pub branch_name: String,
    pub linked_at: String,
}

impl BranchStore {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(BranchStore {
            main_uid: row.try_get("main_uid")?,
            branch_uid: row.try_get("branch_uid")?,
            branch_name: row.try_get("branch_name")?,
            linked_at: row.try_get("linked_at")?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub main_seller_number: String,
    pub branch_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_be_accepted_or_denied() {
        assert_eq!(LinkStatus::Pending.respond(LinkDecision::Accept), Ok(LinkStatus::Accepted));
        assert_eq!(LinkStatus::Pending.respond(LinkDecision::Deny), Ok(LinkStatus::Denied));
    }

    #[test]
    fn answered_requests_are_final() {
        assert_eq!(
            LinkStatus::Denied.respond(LinkDecision::Accept),
            Err(TransitionError::NotAllowed { from: "denied", action: "accept" })
        );
        assert!(LinkStatus::Accepted.respond(LinkDecision::Deny).is_err());
    }
}
