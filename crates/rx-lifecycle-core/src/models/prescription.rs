//! Prescription records, review decisions, and derived statuses.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::MedicineLineItem;

/// Stored review state. Only the review transition changes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrescriptionStatus {
    /// Uploaded, awaiting admin review
    Pending,
    /// Accepted by an admin
    Approved,
    /// Refused by an admin (terminal)
    Rejected,
}

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionStatus::Pending => "pending",
            PrescriptionStatus::Approved => "approved",
            PrescriptionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PrescriptionStatus::Pending),
            "approved" => Some(PrescriptionStatus::Approved),
            "rejected" => Some(PrescriptionStatus::Rejected),
            _ => None,
        }
    }

    /// Whether an admin has already decided this record.
    pub fn is_final(&self) -> bool {
        !matches!(self, PrescriptionStatus::Pending)
    }
}

/// Customer-facing status, recomputed against "now" on every read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DerivedStatus {
    Active,
    Expiring,
    Expired,
    Pending,
    /// Admin refused the prescription. Kept apart from `Expired`.
    Rejected,
}

impl DerivedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedStatus::Active => "ACTIVE",
            DerivedStatus::Expiring => "EXPIRING",
            DerivedStatus::Expired => "EXPIRED",
            DerivedStatus::Pending => "PENDING",
            DerivedStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(DerivedStatus::Active),
            "EXPIRING" => Some(DerivedStatus::Expiring),
            "EXPIRED" => Some(DerivedStatus::Expired),
            "PENDING" => Some(DerivedStatus::Pending),
            "REJECTED" => Some(DerivedStatus::Rejected),
            _ => None,
        }
    }

    /// Statuses a customer can still act on (reorder, reminders).
    pub fn is_actionable(&self) -> bool {
        matches!(self, DerivedStatus::Active | DerivedStatus::Expiring)
    }
}

/// Admin review outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "APPROVE",
            ReviewDecision::Reject => "REJECT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "APPROVE" | "APPROVED" => Some(ReviewDecision::Approve),
            "REJECT" | "REJECTED" => Some(ReviewDecision::Reject),
            _ => None,
        }
    }

    /// Stored status this decision moves a pending record to.
    pub fn target_status(&self) -> PrescriptionStatus {
        match self {
            ReviewDecision::Approve => PrescriptionStatus::Approved,
            ReviewDecision::Reject => PrescriptionStatus::Rejected,
        }
    }
}

/// A stored prescription record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    /// Unique record ID
    pub id: String,
    /// Human-facing reference, assigned at upload
    pub reference_number: String,
    /// Owning customer
    pub user_id: String,
    pub patient_name: String,
    pub doctor_name: String,
    /// Issue date written on the prescription
    pub prescription_date: Option<NaiveDate>,
    pub hospital_clinic: Option<String>,
    /// Stored review state
    pub status: PrescriptionStatus,
    /// Notes left by the reviewing admin
    pub admin_notes: Option<String>,
    /// Explicit expiry override; when absent expiry is derived from the issue date
    pub expires_at: Option<DateTime<Utc>>,
    /// Admin who decided the record
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped on every stored mutation
    pub version: i64,
    /// Upload timestamp
    pub created_at: DateTime<Utc>,
}

impl Prescription {
    /// Resolve the expiry instant: the explicit override if present, otherwise
    /// the start of the issue date (UTC) plus the validity window.
    ///
    /// `None` when there is no issue date or the window overflows the calendar.
    pub fn resolve_expires_at(&self, validity_days: i64) -> Option<DateTime<Utc>> {
        if let Some(explicit) = self.expires_at {
            return Some(explicit);
        }
        let date = self.prescription_date?;
        start_of_day(date).checked_add_signed(Duration::try_days(validity_days)?)
    }
}

/// Midnight UTC on the given date.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Data captured when a customer uploads a prescription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PrescriptionUpload {
    pub user_id: String,
    pub patient_name: String,
    pub doctor_name: String,
    pub prescription_date: Option<NaiveDate>,
    pub hospital_clinic: Option<String>,
    /// Explicit expiry, e.g. when the prescriber wrote a shorter validity
    pub expires_at: Option<DateTime<Utc>>,
    /// Medicines listed on the prescription
    pub medicines: Vec<MedicineLineItem>,
}
