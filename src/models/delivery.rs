use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::models::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
    ResubmissionRequired,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::UnderReview => "under_review",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::ResubmissionRequired => "resubmission_required",
        }
    }

    /// Whether a partner with this status (or none) may upload a document bundle.
    pub fn check_submission(current: Option<Self>) -> Result<(), TransitionError> {
        match current {
            None
            | Some(VerificationStatus::Rejected)
            | Some(VerificationStatus::ResubmissionRequired) => Ok(()),
            Some(status) => Err(TransitionError::NotAllowed {
                from: status.as_str(),
                action: "submit documents",
            }),
        }
    }

    pub fn apply(self, action: ReviewAction, note: Option<&str>) -> Result<Self, TransitionError> {
        use VerificationStatus::*;

        let has_note = note.is_some_and(|n| !n.trim().is_empty());
        let next = match (self, action) {
            (Pending, ReviewAction::StartReview) => UnderReview,
            (Pending | UnderReview, ReviewAction::Approve) => Approved,
            (Pending | UnderReview, ReviewAction::Reject) => Rejected,
            (Pending | UnderReview, ReviewAction::RequestResubmission) => ResubmissionRequired,
            (from, action) => {
                return Err(TransitionError::NotAllowed {
                    from: from.as_str(),
                    action: action.as_str(),
                })
            }
        };
        if matches!(next, Rejected | ResubmissionRequired) && !has_note {
            return Err(TransitionError::NoteRequired(action.as_str()));
        }
        Ok(next)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "under_review" => Ok(VerificationStatus::UnderReview),
            "approved" => Ok(VerificationStatus::Approved),
            "rejected" => Ok(VerificationStatus::Rejected),
            "resubmission_required" => Ok(VerificationStatus::ResubmissionRequired),
            other => Err(format!("unknown verification status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    StartReview,
    Approve,
    Reject,
    RequestResubmission,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::StartReview => "start review",
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
            ReviewAction::RequestResubmission => "request resubmission",
        }
    }
}

/// Image URLs produced by the upload service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDocuments {
    pub license_front: String,
    pub license_back: String,
    pub vehicle_front: String,
    pub vehicle_back: String,
    pub rc_image: String,
}

impl DeliveryDocuments {
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("licenseFront", &self.license_front),
            ("licenseBack", &self.license_back),
            ("vehicleFront", &self.vehicle_front),
            ("vehicleBack", &self.vehicle_back),
            ("rcImage", &self.rc_image),
        ];
        for (name, url) in fields {
            if url.trim().is_empty() {
                return Err(format!("{name} is required"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryVerification {
    pub uid: String,
    #[serde(flatten)]
    pub documents: DeliveryDocuments,
    pub status: VerificationStatus,
    pub admin_note: Option<String>,
    pub submitted_at: String,
    pub reviewed_at: Option<String>,
}

pub(crate) const VERIFICATION_COLUMNS: &str = "uid, license_front, license_back, vehicle_front, vehicle_back, rc_image, status, admin_note, submitted_at, reviewed_at";

impl DeliveryVerification {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(DeliveryVerification {
            uid: row.try_get("uid")?,
            documents: DeliveryDocuments {
                license_front: row.try_get("license_front")?,
                license_back: row.try_get("license_back")?,
                vehicle_front: row.try_get("vehicle_front")?,
                vehicle_back: row.try_get("vehicle_back")?,
                rc_image: row.try_get("rc_image")?,
            },
            status: status.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            admin_note: row.try_get("admin_note")?,
            submitted_at: row.try_get("submitted_at")?,
            reviewed_at: row.try_get("reviewed_at")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub action: ReviewAction,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::VerificationStatus::*;
    use super::*;

    #[test]
    fn first_submission_and_resubmission_are_allowed() {
        assert!(VerificationStatus::check_submission(None).is_ok());
        assert!(VerificationStatus::check_submission(Some(Rejected)).is_ok());
        assert!(VerificationStatus::check_submission(Some(ResubmissionRequired)).is_ok());
    }

    #[test]
    fn submission_blocked_while_pending_or_approved() {
        for status in [Pending, UnderReview, Approved] {
            assert!(VerificationStatus::check_submission(Some(status)).is_err());
        }
    }

    #[test]
    fn review_flow() {
        let status = Pending.apply(ReviewAction::StartReview, None).unwrap();
        assert_eq!(status, UnderReview);
        assert_eq!(status.apply(ReviewAction::Approve, None).unwrap(), Approved);
    }

    #[test]
    fn approve_directly_from_pending() {
        assert_eq!(Pending.apply(ReviewAction::Approve, None).unwrap(), Approved);
    }

    #[test]
    fn rejection_requires_note() {
        assert_eq!(
            UnderReview.apply(ReviewAction::Reject, Some("  ")),
            Err(TransitionError::NoteRequired("reject"))
        );
        assert_eq!(
            UnderReview.apply(ReviewAction::Reject, Some("blurry licence")).unwrap(),
            Rejected
        );
        assert_eq!(
            Pending
                .apply(ReviewAction::RequestResubmission, Some("rc missing"))
                .unwrap(),
            ResubmissionRequired
        );
    }

    #[test]
    fn terminal_states_cannot_be_reviewed() {
        assert!(Approved.apply(ReviewAction::Reject, Some("late")).is_err());
        assert!(Rejected.apply(ReviewAction::Approve, None).is_err());
        assert!(UnderReview.apply(ReviewAction::StartReview, None).is_err());
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [Pending, UnderReview, Approved, Rejected, ResubmissionRequired] {
            assert_eq!(status.as_str().parse::<VerificationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn documents_require_every_image() {
        let docs = DeliveryDocuments {
            license_front: "a".into(),
            license_back: "b".into(),
            vehicle_front: "c".into(),
            vehicle_back: "".into(),
            rc_image: "e".into(),
        };
        assert_eq!(docs.validate(), Err("vehicleBack is required".to_string()));
    }
}
