//! Status derivation: stored record + "now" -> customer-facing status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LifecyclePolicy;
use crate::models::{DerivedStatus, Prescription, PrescriptionStatus};

/// Result of deriving a record's status at a given instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusView {
    pub derived_status: DerivedStatus,
    /// Resolved expiry (explicit override or issue date + validity)
    pub expires_at: Option<DateTime<Utc>>,
    pub is_reorderable: bool,
    /// Whole calendar days until expiry. Only set for approved records.
    pub days_left: Option<i64>,
}

/// Derive the customer-facing status of `record` at `now`.
///
/// Never fails. Pending and rejected records pass through without any date
/// logic. Approved records are classified by whole UTC calendar days left and
/// are expired from the expiry instant onwards. Derived expiries fall on
/// midnight, so their classification is stable for the whole of a calendar day.
pub fn derive_status(record: &Prescription, now: DateTime<Utc>, policy: &LifecyclePolicy) -> StatusView {
    let expires_at = record.resolve_expires_at(policy.validity_days);

    match record.status {
        PrescriptionStatus::Pending => StatusView {
            derived_status: DerivedStatus::Pending,
            expires_at,
            is_reorderable: false,
            days_left: None,
        },
        PrescriptionStatus::Rejected => StatusView {
            derived_status: DerivedStatus::Rejected,
            expires_at,
            is_reorderable: false,
            days_left: None,
        },
        PrescriptionStatus::Approved => {
            let Some(expiry) = expires_at else {
                // Unreachable through intake/review, which require an issue date.
                return StatusView {
                    derived_status: DerivedStatus::Expired,
                    expires_at: None,
                    is_reorderable: false,
                    days_left: None,
                };
            };

            // Once the expiry instant has passed the record is expired, even
            // if it is still the same calendar day.
            let days_left = if now >= expiry {
                calendar_days_until(expiry, now).min(-1)
            } else {
                calendar_days_until(expiry, now)
            };
            let derived_status = if days_left < 0 {
                DerivedStatus::Expired
            } else if days_left <= policy.expiring_window_days {
                DerivedStatus::Expiring
            } else {
                DerivedStatus::Active
            };

            StatusView {
                derived_status,
                expires_at: Some(expiry),
                is_reorderable: derived_status.is_actionable(),
                days_left: Some(days_left),
            }
        }
    }
}

/// Number of UTC calendar days from `now` to `until` (negative once past).
pub fn calendar_days_until(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (until.date_naive() - now.date_naive()).num_days()
}

/// A prescription enriched with its derived status, as returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionView {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub lifecycle: StatusView,
}

impl PrescriptionView {
    pub fn derive(prescription: Prescription, now: DateTime<Utc>, policy: &LifecyclePolicy) -> Self {
        let lifecycle = derive_status(&prescription, now, policy);
        Self {
            prescription,
            lifecycle,
        }
    }
}

/// Annotate every record with its status at `now`.
pub fn annotate(
    records: Vec<Prescription>,
    now: DateTime<Utc>,
    policy: &LifecyclePolicy,
) -> Vec<PrescriptionView> {
    records
        .into_iter()
        .map(|record| PrescriptionView::derive(record, now, policy))
        .collect()
}

/// Views whose derived status matches `status`.
pub fn filter_by_status(views: &[PrescriptionView], status: DerivedStatus) -> Vec<&PrescriptionView> {
    views
        .iter()
        .filter(|view| view.lifecycle.derived_status == status)
        .collect()
}

/// Per-tab counts for a listing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSummary {
    pub total: u32,
    pub active: u32,
    pub expiring: u32,
    pub expired: u32,
    pub pending: u32,
    pub rejected: u32,
    pub reorderable: u32,
}

impl StatusSummary {
    pub fn from_views(views: &[PrescriptionView]) -> Self {
        let mut summary = StatusSummary::default();
        for view in views {
            summary.total += 1;
            match view.lifecycle.derived_status {
                DerivedStatus::Active => summary.active += 1,
                DerivedStatus::Expiring => summary.expiring += 1,
                DerivedStatus::Expired => summary.expired += 1,
                DerivedStatus::Pending => summary.pending += 1,
                DerivedStatus::Rejected => summary.rejected += 1,
            }
            if view.lifecycle.is_reorderable {
                summary.reorderable += 1;
            }
        }
        summary
    }
}
