//! Admin review transition: PENDING -> APPROVED | REJECTED, exactly once.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::collaborators::{AuditSink, CollaboratorError, PrescriptionStore};
use crate::models::{AuditEvent, Prescription, ReviewDecision};

/// Why a review was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReviewError {
    #[error("Prescription not found: {0}")]
    NotFound(String),

    #[error("Prescription has already been reviewed")]
    AlreadyFinal,

    #[error("Prescription has no issue date")]
    MissingPrescriptionDate,

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Result of a successful review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    /// The record as stored after the transition
    pub prescription: Prescription,
    /// The audit event for this transition
    pub audit_event: AuditEvent,
    /// Set when the audit event could not be written. The transition stands;
    /// the caller should re-submit `audit_event`.
    pub audit_warning: Option<String>,
}

impl ReviewOutcome {
    pub fn audit_recorded(&self) -> bool {
        self.audit_warning.is_none()
    }
}

/// Apply `decision` to a pending record, returning the updated copy.
///
/// Pure: nothing is persisted. The returned record carries the next version.
pub fn apply_review(
    record: &Prescription,
    decision: ReviewDecision,
    notes: Option<String>,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Prescription, ReviewError> {
    if record.status.is_final() {
        return Err(ReviewError::AlreadyFinal);
    }
    if record.prescription_date.is_none() {
        return Err(ReviewError::MissingPrescriptionDate);
    }

    let mut updated = record.clone();
    updated.status = decision.target_status();
    updated.admin_notes = notes.filter(|n| !n.trim().is_empty());
    updated.reviewed_by = Some(actor.to_string());
    updated.reviewed_at = Some(now);
    updated.version = record.version + 1;
    Ok(updated)
}

/// Review a stored record.
///
/// The transition is persisted with a compare-and-swap on the record's version
/// before the audit event is emitted. A lost swap reports `AlreadyFinal`. A
/// failed audit write does not undo the transition.
pub fn review(
    store: &dyn PrescriptionStore,
    audit: &dyn AuditSink,
    prescription_id: &str,
    decision: ReviewDecision,
    notes: Option<String>,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome, ReviewError> {
    let record = store
        .get(prescription_id)?
        .ok_or_else(|| ReviewError::NotFound(prescription_id.to_string()))?;

    let updated = apply_review(&record, decision, notes, actor, now)?;

    if !store.commit_review(&updated, record.version)? {
        tracing::debug!(prescription_id, actor, "Concurrent review won the race");
        return Err(ReviewError::AlreadyFinal);
    }

    tracing::info!(
        prescription_id,
        actor,
        decision = decision.as_str(),
        "Prescription reviewed"
    );

    let audit_event = AuditEvent::review(&updated, decision, actor, now);
    let audit_warning = match audit.record(&audit_event) {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(prescription_id, error = %e, "Failed to record review audit event");
            Some(e.to_string())
        }
    };

    Ok(ReviewOutcome {
        prescription: updated,
        audit_event,
        audit_warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::test_support::{approved_on, at, issue_date};
    use crate::models::PrescriptionStatus;

    fn pending() -> Prescription {
        let mut record = approved_on(issue_date());
        record.status = PrescriptionStatus::Pending;
        record.reviewed_by = None;
        record.reviewed_at = None;
        record.version = 0;
        record
    }

    #[test]
    fn test_approve_sets_review_fields() {
        let now = at(issue_date());
        let updated = apply_review(&pending(), ReviewDecision::Approve, Some("ok".into()), "admin-1", now).unwrap();

        assert_eq!(updated.status, PrescriptionStatus::Approved);
        assert_eq!(updated.admin_notes.as_deref(), Some("ok"));
        assert_eq!(updated.reviewed_by.as_deref(), Some("admin-1"));
        assert_eq!(updated.reviewed_at, Some(now));
        assert_eq!(updated.version, 1);
    }

    #[test]
    fn test_blank_notes_are_dropped() {
        let updated =
            apply_review(&pending(), ReviewDecision::Reject, Some("   ".into()), "admin-1", at(issue_date()))
                .unwrap();
        assert_eq!(updated.admin_notes, None);
    }

    #[test]
    fn test_decided_records_are_final() {
        for status in [PrescriptionStatus::Approved, PrescriptionStatus::Rejected] {
            let mut record = pending();
            record.status = status;
            for decision in [ReviewDecision::Approve, ReviewDecision::Reject] {
                let result = apply_review(&record, decision, None, "admin-1", at(issue_date()));
                assert_eq!(result, Err(ReviewError::AlreadyFinal));
            }
        }
    }

    #[test]
    fn test_missing_date_refused() {
        let mut record = pending();
        record.prescription_date = None;

        let result = apply_review(&record, ReviewDecision::Approve, None, "admin-1", at(issue_date()));
        assert_eq!(result, Err(ReviewError::MissingPrescriptionDate));
    }

    #[test]
    fn test_final_check_precedes_date_check() {
        let mut record = pending();
        record.status = PrescriptionStatus::Rejected;
        record.prescription_date = None;

        let result = apply_review(&record, ReviewDecision::Approve, None, "admin-1", at(issue_date()));
        assert_eq!(result, Err(ReviewError::AlreadyFinal));
    }
}
