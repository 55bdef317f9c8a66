//! Boundaries to the systems the engine depends on.
//!
//! The engine never reaches for ambient state: every read and write goes
//! through one of these traits, passed in by the caller. [`crate::db::Database`]
//! implements all of them on SQLite.

use thiserror::Error;

use crate::db::DbError;
use crate::models::{
    AuditEvent, MedicineLineItem, Prescription, PrescriptionStatus, ReminderHandle,
    ReminderRequest,
};

/// Failure reported by a collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected by collaborator: {0}")]
    Rejected(String),
}

impl From<DbError> for CollaboratorError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => CollaboratorError::NotFound(what),
            DbError::Constraint(msg) => CollaboratorError::Rejected(msg),
            other => CollaboratorError::Unavailable(other.to_string()),
        }
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Persistence for prescription records.
pub trait PrescriptionStore {
    /// Persist a newly uploaded record with the medicines captured on it.
    fn insert(&self, record: &Prescription, medicines: &[MedicineLineItem]) -> CollaboratorResult<()>;

    fn get(&self, id: &str) -> CollaboratorResult<Option<Prescription>>;

    fn list_for_user(&self, user_id: &str) -> CollaboratorResult<Vec<Prescription>>;

    fn list_by_status(&self, status: PrescriptionStatus) -> CollaboratorResult<Vec<Prescription>>;

    /// Store a review decision if, and only if, the stored record is still
    /// pending at `expected_version`. Returns `false` when the swap lost.
    fn commit_review(&self, updated: &Prescription, expected_version: i64) -> CollaboratorResult<bool>;
}

/// Read-only source of the medicines associated with a prescription.
pub trait MedicineSource {
    fn medicines_for(&self, prescription_id: &str) -> CollaboratorResult<Vec<MedicineLineItem>>;
}

/// Audit-log sink.
pub trait AuditSink {
    fn record(&self, event: &AuditEvent) -> CollaboratorResult<()>;
}

/// Notification scheduler. Delivery happens elsewhere.
pub trait ReminderScheduler {
    fn schedule(&self, request: &ReminderRequest) -> CollaboratorResult<ReminderHandle>;

    /// Returns `false` if the handle is unknown or already cancelled.
    fn cancel(&self, handle: &ReminderHandle) -> CollaboratorResult<bool>;
}
