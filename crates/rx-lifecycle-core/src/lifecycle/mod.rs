//! Prescription lifecycle engine.
//!
//! Flow: Upload → PENDING → admin review → APPROVED | REJECTED
//!
//! An approved record is never mutated again; it moves ACTIVE → EXPIRING →
//! EXPIRED purely as a function of the injected "now". Every operation takes
//! "now" as an argument and reaches storage only through the collaborator
//! traits, so the same inputs always give the same answer.

mod intake;
mod reminder;
mod reorder;
mod review;
mod status;

pub use intake::*;
pub use reminder::*;
pub use reorder::*;
pub use review::*;
pub use status::*;

use chrono::{DateTime, Utc};

use crate::collaborators::{
    AuditSink, CollaboratorError, CollaboratorResult, MedicineSource, PrescriptionStore,
    ReminderScheduler,
};
use crate::config::{EngineConfig, DEFAULT_EXPIRING_WINDOW_DAYS, DEFAULT_VALIDITY_DAYS};
use crate::db::Database;
use crate::models::{
    AuditEvent, MedicineLineItem, Prescription, PrescriptionStatus, PrescriptionUpload,
    ReminderChannel, ReminderHandle, ReviewDecision,
};

/// Date rules for status derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Days a prescription stays valid after its issue date
    pub validity_days: i64,
    /// Days left at or below which an approved record is EXPIRING
    pub expiring_window_days: i64,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            validity_days: DEFAULT_VALIDITY_DAYS,
            expiring_window_days: DEFAULT_EXPIRING_WINDOW_DAYS,
        }
    }
}

/// Wires the lifecycle operations to their collaborators.
pub struct PrescriptionEngine<'a> {
    store: &'a dyn PrescriptionStore,
    medicines: &'a dyn MedicineSource,
    audit: &'a dyn AuditSink,
    reminders: &'a dyn ReminderScheduler,
    config: EngineConfig,
}

impl<'a> PrescriptionEngine<'a> {
    pub fn new(
        store: &'a dyn PrescriptionStore,
        medicines: &'a dyn MedicineSource,
        audit: &'a dyn AuditSink,
        reminders: &'a dyn ReminderScheduler,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            medicines,
            audit,
            reminders,
            config,
        }
    }

    /// Engine backed entirely by one SQLite database.
    pub fn with_database(db: &'a Database, config: EngineConfig) -> Self {
        Self::new(db, db, db, db, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn policy(&self) -> LifecyclePolicy {
        self.config.policy()
    }

    /// Validate and store a new upload as a pending prescription.
    pub fn submit(&self, upload: &PrescriptionUpload, now: DateTime<Utc>) -> Result<Prescription, IntakeError> {
        let record = accept_upload(upload, &self.config.reference_prefix, now)?;
        self.store.insert(&record, &upload.medicines)?;
        tracing::info!(
            prescription_id = %record.id,
            reference = %record.reference_number,
            medicines = upload.medicines.len(),
            "Prescription uploaded"
        );
        Ok(record)
    }

    /// A single record with its status at `now`.
    pub fn get(&self, prescription_id: &str, now: DateTime<Utc>) -> CollaboratorResult<Option<PrescriptionView>> {
        let policy = self.policy();
        Ok(self
            .store
            .get(prescription_id)?
            .map(|record| PrescriptionView::derive(record, now, &policy)))
    }

    /// All of a user's prescriptions, newest issue date first, with statuses at `now`.
    pub fn list_for_user(&self, user_id: &str, now: DateTime<Utc>) -> CollaboratorResult<Vec<PrescriptionView>> {
        let mut records = self.store.list_for_user(user_id)?;
        records.sort_by(|a, b| {
            b.prescription_date
                .cmp(&a.prescription_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(annotate(records, now, &self.policy()))
    }

    /// Admin queue: pending records, oldest upload first.
    pub fn list_pending_reviews(&self, now: DateTime<Utc>) -> CollaboratorResult<Vec<PrescriptionView>> {
        let mut records = self.store.list_by_status(PrescriptionStatus::Pending)?;
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(annotate(records, now, &self.policy()))
    }

    /// Medicines to prefill the cart with, re-checked against the stored record.
    pub fn request_reorder(
        &self,
        prescription_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<MedicineLineItem>, ReorderError> {
        let record = self
            .store
            .get(prescription_id)?
            .ok_or_else(|| ReorderError::NotFound(prescription_id.to_string()))?;
        request_reorder(&record, now, &self.policy(), self.medicines)
    }

    /// Apply an admin decision. Authorization is the caller's job.
    pub fn review(
        &self,
        prescription_id: &str,
        decision: ReviewDecision,
        notes: Option<String>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, ReviewError> {
        review(self.store, self.audit, prescription_id, decision, notes, actor, now)
    }

    /// Re-submit an audit event whose first write failed.
    pub fn record_audit_event(&self, event: &AuditEvent) -> CollaboratorResult<()> {
        self.audit.record(event)
    }

    /// Schedule an expiry reminder. `channel` falls back to the configured default.
    pub fn schedule_reminder(
        &self,
        prescription_id: &str,
        notify_before_days: i64,
        channel: Option<ReminderChannel>,
        now: DateTime<Utc>,
    ) -> Result<ReminderHandle, ReminderError> {
        let record = self
            .store
            .get(prescription_id)?
            .ok_or_else(|| ReminderError::NotFound(prescription_id.to_string()))?;
        let channel = channel.unwrap_or(self.config.default_channel);
        schedule_reminder(&record, notify_before_days, channel, now, &self.policy(), self.reminders)
    }

    pub fn cancel_reminder(&self, handle: &ReminderHandle) -> Result<bool, CollaboratorError> {
        self.reminders.cancel(handle)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, NaiveDate, Utc};

    use crate::models::{start_of_day, Prescription, PrescriptionStatus};

    pub fn issue_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    pub fn at(date: NaiveDate) -> DateTime<Utc> {
        start_of_day(date)
    }

    pub fn approved_on(date: NaiveDate) -> Prescription {
        Prescription {
            id: format!("rx-{}", date),
            reference_number: format!("RX-{}-0000AA", date.format("%Y%m%d")),
            user_id: "user-1".into(),
            patient_name: "Rahim Uddin".into(),
            doctor_name: "Dr. Karim".into(),
            prescription_date: Some(date),
            hospital_clinic: Some("Dhaka Medical College Hospital".into()),
            status: PrescriptionStatus::Approved,
            admin_notes: None,
            expires_at: None,
            reviewed_by: Some("admin-1".into()),
            reviewed_at: Some(at(date)),
            version: 1,
            created_at: at(date),
        }
    }
}
