//! Reorder eligibility gate.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::status::{derive_status, StatusView};
use super::LifecyclePolicy;
use crate::collaborators::{CollaboratorError, MedicineSource};
use crate::models::{DerivedStatus, MedicineLineItem, Prescription, PrescriptionStatus};

/// Why a reorder was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReorderError {
    #[error("Prescription not found: {0}")]
    NotFound(String),

    #[error("Prescription has not been approved")]
    NotApproved,

    #[error("Prescription has expired; upload a new prescription")]
    Expired,

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl ReorderError {
    /// Refusals that must be shown as compliance messaging, not as a failure.
    pub fn is_compliance_block(&self) -> bool {
        matches!(self, ReorderError::Expired)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ReorderError::NotFound(_) => "This prescription could not be found.",
            ReorderError::NotApproved => "This prescription is not approved for reorder.",
            ReorderError::Expired => {
                "This prescription has expired. Please upload a new prescription to reorder."
            }
            ReorderError::Collaborator(_) => "Reorder is temporarily unavailable. Please try again.",
        }
    }
}

/// Whether `record` can be used to refill a cart at `now`.
pub fn can_reorder(record: &Prescription, now: DateTime<Utc>, policy: &LifecyclePolicy) -> bool {
    check_reorder(record, now, policy).is_ok()
}

/// Re-derive the record's status and refuse anything not approved and unexpired.
pub fn check_reorder(
    record: &Prescription,
    now: DateTime<Utc>,
    policy: &LifecyclePolicy,
) -> Result<StatusView, ReorderError> {
    if record.status != PrescriptionStatus::Approved {
        return Err(ReorderError::NotApproved);
    }

    let view = derive_status(record, now, policy);
    if view.derived_status == DerivedStatus::Expired {
        return Err(ReorderError::Expired);
    }
    Ok(view)
}

/// Medicines to prefill the cart with. Performs no side effects.
pub fn request_reorder(
    record: &Prescription,
    now: DateTime<Utc>,
    policy: &LifecyclePolicy,
    medicines: &dyn MedicineSource,
) -> Result<Vec<MedicineLineItem>, ReorderError> {
    if let Err(e) = check_reorder(record, now, policy) {
        tracing::debug!(prescription_id = %record.id, error = %e, "Reorder refused");
        return Err(e);
    }
    Ok(medicines.medicines_for(&record.id)?)
}
