//! Audit events emitted to the audit-log collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Prescription, ReviewDecision};

/// Action name recorded for admin reviews.
pub const ACTION_REVIEW_PRESCRIPTION: &str = "REVIEW_PRESCRIPTION";

/// Target type recorded for prescription events.
pub const TARGET_PRESCRIPTION: &str = "PRESCRIPTION";

/// A single audit event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    /// Who performed the action
    pub actor: String,
    /// Action-specific details
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Build the event for an admin review of a prescription.
    pub fn review(
        prescription: &Prescription,
        decision: ReviewDecision,
        actor: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            action: ACTION_REVIEW_PRESCRIPTION.to_string(),
            target_type: TARGET_PRESCRIPTION.to_string(),
            target_id: prescription.id.clone(),
            actor: actor.to_string(),
            metadata: serde_json::json!({
                "decision": decision.as_str(),
                "reference_number": prescription.reference_number,
                "status": prescription.status.as_str(),
                "notes": prescription.admin_notes,
            }),
            timestamp,
        }
    }

    /// Decision recorded in the metadata, if any.
    pub fn decision(&self) -> Option<ReviewDecision> {
        self.metadata
            .get("decision")
            .and_then(|v| v.as_str())
            .and_then(ReviewDecision::parse)
    }

    /// Serialize to JSON for hashing into the audit chain.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        // serde_json::Value maps are ordered, so output is stable for equal events
        serde_json::to_string(self)
    }
}
