//! Rx Lifecycle Core Library
//!
//! Prescription lifecycle and smart reorder engine for the pharmacy storefront.
//!
//! # Architecture
//!
//! ```text
//!   Upload (file intake)
//!         │
//!         ▼
//!   [PENDING] ──── admin review (CAS on version) ────┐
//!         │                                          │
//!         ▼                                          ▼
//!   [APPROVED]                                  [REJECTED] (terminal)
//!         │
//!         │  derived against "now" on every read
//!         ▼
//!   ACTIVE ──► EXPIRING (≤ 14 days) ──► EXPIRED
//!     │            │
//!     └────┬───────┘
//!          ├──► Reorder gate ──► medicine line items ──► cart (external)
//!          └──► Reminder contract ──► notification outbox (external delivery)
//!
//!   every review ──► hash-chained audit log ──► compliance export
//! ```
//!
//! # Core Principle
//!
//! **Status is derived, never stored.** Only the admin review mutates a record;
//! ACTIVE/EXPIRING/EXPIRED are recomputed from the issue date and an injected
//! "now" on every read.
//!
//! # Modules
//!
//! - [`models`]: Domain types (Prescription, statuses, audit events, reminders)
//! - [`lifecycle`]: Status deriver, reorder gate, review transition, reminder contract
//! - [`collaborators`]: Trait seams for storage, medicines, audit, notifications
//! - [`db`]: SQLite implementation of every collaborator
//! - [`audit`]: Hash-chained audit trail
//! - [`export`]: Audit trail export
//! - [`config`]: Engine configuration
//! - [`logging`]: Tracing setup

pub mod audit;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod export;
pub mod lifecycle;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use audit::{AuditTrail, ChainVerification};
pub use config::EngineConfig;
pub use db::Database;
pub use lifecycle::{
    derive_status, LifecyclePolicy, PrescriptionEngine, PrescriptionView, ReminderError,
    ReorderError, ReviewError, ReviewOutcome, StatusSummary, StatusView,
};
pub use models::{
    AuditEvent, DerivedStatus, MedicineLineItem, Prescription, PrescriptionStatus,
    PrescriptionUpload, ReminderChannel, ReminderHandle, ReviewDecision,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum RxLifecycleError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Not approved: {0}")]
    NotApproved(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Already final: {0}")]
    AlreadyFinal(String),

    #[error("Missing prescription date: {0}")]
    MissingPrescriptionDate(String),

    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Collaborator error: {0}")]
    CollaboratorError(String),

    #[error("Audit error: {0}")]
    AuditError(String),
}

impl From<db::DbError> for RxLifecycleError {
    fn from(e: db::DbError) -> Self {
        RxLifecycleError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for RxLifecycleError {
    fn from(e: serde_json::Error) -> Self {
        RxLifecycleError::SerializationError(e.to_string())
    }
}

impl From<config::ConfigError> for RxLifecycleError {
    fn from(e: config::ConfigError) -> Self {
        RxLifecycleError::InvalidInput(e.to_string())
    }
}

impl From<collaborators::CollaboratorError> for RxLifecycleError {
    fn from(e: collaborators::CollaboratorError) -> Self {
        match e {
            collaborators::CollaboratorError::NotFound(what) => RxLifecycleError::NotFound(what),
            other => RxLifecycleError::CollaboratorError(other.to_string()),
        }
    }
}

impl From<audit::AuditError> for RxLifecycleError {
    fn from(e: audit::AuditError) -> Self {
        RxLifecycleError::AuditError(e.to_string())
    }
}

impl From<lifecycle::IntakeError> for RxLifecycleError {
    fn from(e: lifecycle::IntakeError) -> Self {
        match e {
            lifecycle::IntakeError::Collaborator(c) => c.into(),
            other => RxLifecycleError::InvalidInput(other.to_string()),
        }
    }
}

impl From<ReorderError> for RxLifecycleError {
    fn from(e: ReorderError) -> Self {
        let message = e.user_message().to_string();
        match e {
            ReorderError::NotFound(id) => RxLifecycleError::NotFound(id),
            ReorderError::NotApproved => RxLifecycleError::NotApproved(message),
            ReorderError::Expired => RxLifecycleError::Expired(message),
            ReorderError::Collaborator(c) => c.into(),
        }
    }
}

impl From<ReviewError> for RxLifecycleError {
    fn from(e: ReviewError) -> Self {
        let message = e.to_string();
        match e {
            ReviewError::NotFound(id) => RxLifecycleError::NotFound(id),
            ReviewError::AlreadyFinal => RxLifecycleError::AlreadyFinal(message),
            ReviewError::MissingPrescriptionDate => RxLifecycleError::MissingPrescriptionDate(message),
            ReviewError::Collaborator(c) => c.into(),
        }
    }
}

impl From<ReminderError> for RxLifecycleError {
    fn from(e: ReminderError) -> Self {
        let message = e.to_string();
        let user_message = e.user_message().to_string();
        match e {
            ReminderError::NotFound(id) => RxLifecycleError::NotFound(id),
            ReminderError::NotEligible => RxLifecycleError::NotEligible(user_message),
            ReminderError::InvalidWindow { .. } => RxLifecycleError::InvalidWindow(message),
            ReminderError::Collaborator(c) => c.into(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for RxLifecycleError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        RxLifecycleError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
///
/// `config_json` overrides the default engine configuration. Tracing is
/// installed with the configured `log_filter` unless a subscriber already exists.
#[uniffi::export]
pub fn open_database(
    path: String,
    config_json: Option<String>,
) -> Result<Arc<RxLifecycleCore>, RxLifecycleError> {
    let config = match config_json {
        Some(json) => EngineConfig::from_json_str(&json)?,
        None => EngineConfig::default(),
    };
    logging::init_tracing(&config.log_filter);
    let db = Database::open(&path)?;
    Ok(Arc::new(RxLifecycleCore {
        db: Arc::new(Mutex::new(db)),
        config,
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<RxLifecycleCore>, RxLifecycleError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(RxLifecycleCore {
        db: Arc::new(Mutex::new(db)),
        config: EngineConfig::default(),
    }))
}

/// Install the tracing subscriber. Returns `false` if one was already installed.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) -> bool {
    let filter = filter.unwrap_or_else(|| config::DEFAULT_LOG_FILTER.to_string());
    logging::init_tracing(&filter)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe engine wrapper for FFI.
#[derive(uniffi::Object)]
pub struct RxLifecycleCore {
    db: Arc<Mutex<Database>>,
    config: EngineConfig,
}

#[uniffi::export]
impl RxLifecycleCore {
    // =========================================================================
    // Customer Operations
    // =========================================================================

    /// Store a new upload as a pending prescription.
    pub fn submit_prescription(
        &self,
        upload: FfiPrescriptionUpload,
    ) -> Result<FfiPrescription, RxLifecycleError> {
        let db = self.db.lock()?;
        let engine = PrescriptionEngine::with_database(&db, self.config.clone());
        let now = Utc::now();
        let record = engine.submit(&upload.try_into()?, now)?;
        Ok(PrescriptionView::derive(record, now, &engine.policy()).into())
    }

    /// Get a prescription with its current status.
    pub fn get_prescription(&self, id: String) -> Result<Option<FfiPrescription>, RxLifecycleError> {
        let db = self.db.lock()?;
        let engine = PrescriptionEngine::with_database(&db, self.config.clone());
        Ok(engine.get(&id, Utc::now())?.map(|v| v.into()))
    }

    /// List a user's prescriptions with their current statuses.
    pub fn list_prescriptions(&self, user_id: String) -> Result<Vec<FfiPrescription>, RxLifecycleError> {
        let db = self.db.lock()?;
        let engine = PrescriptionEngine::with_database(&db, self.config.clone());
        let views = engine.list_for_user(&user_id, Utc::now())?;
        Ok(views.into_iter().map(|v| v.into()).collect())
    }

    /// Per-tab counts for a user's prescriptions.
    pub fn summarize_prescriptions(&self, user_id: String) -> Result<FfiStatusSummary, RxLifecycleError> {
        let db = self.db.lock()?;
        let engine = PrescriptionEngine::with_database(&db, self.config.clone());
        let views = engine.list_for_user(&user_id, Utc::now())?;
        Ok(StatusSummary::from_views(&views).into())
    }

    /// Medicines to prefill the cart with.
    pub fn request_reorder(&self, id: String) -> Result<Vec<FfiMedicineLineItem>, RxLifecycleError> {
        let db = self.db.lock()?;
        let engine = PrescriptionEngine::with_database(&db, self.config.clone());
        let items = engine.request_reorder(&id, Utc::now())?;
        Ok(items.into_iter().map(|i| i.into()).collect())
    }

    /// Schedule an expiry reminder. Returns the reminder handle.
    pub fn schedule_reminder(
        &self,
        id: String,
        notify_before_days: i64,
        channel: Option<String>,
    ) -> Result<String, RxLifecycleError> {
        let channel = channel
            .map(|c| {
                ReminderChannel::parse(&c)
                    .ok_or_else(|| RxLifecycleError::InvalidInput(format!("Unknown channel: {}", c)))
            })
            .transpose()?;

        let db = self.db.lock()?;
        let engine = PrescriptionEngine::with_database(&db, self.config.clone());
        let handle = engine.schedule_reminder(&id, notify_before_days, channel, Utc::now())?;
        Ok(handle.id)
    }

    /// Cancel a scheduled reminder.
    pub fn cancel_reminder(&self, handle: String) -> Result<bool, RxLifecycleError> {
        let db = self.db.lock()?;
        let engine = PrescriptionEngine::with_database(&db, self.config.clone());
        Ok(engine.cancel_reminder(&ReminderHandle::new(handle))?)
    }

    // =========================================================================
    // Admin Operations
    // =========================================================================

    /// Pending prescriptions, oldest first.
    pub fn list_pending_reviews(&self) -> Result<Vec<FfiPrescription>, RxLifecycleError> {
        let db = self.db.lock()?;
        let engine = PrescriptionEngine::with_database(&db, self.config.clone());
        let views = engine.list_pending_reviews(Utc::now())?;
        Ok(views.into_iter().map(|v| v.into()).collect())
    }

    /// Approve or reject a pending prescription.
    pub fn review_prescription(
        &self,
        id: String,
        decision: String,
        notes: Option<String>,
        actor: String,
    ) -> Result<FfiReviewOutcome, RxLifecycleError> {
        let decision = ReviewDecision::parse(&decision)
            .ok_or_else(|| RxLifecycleError::InvalidInput(format!("Unknown decision: {}", decision)))?;

        let db = self.db.lock()?;
        let engine = PrescriptionEngine::with_database(&db, self.config.clone());
        let now = Utc::now();
        let outcome = engine.review(&id, decision, notes, &actor, now)?;

        Ok(FfiReviewOutcome {
            audit_event_json: serde_json::to_string(&outcome.audit_event)?,
            audit_warning: outcome.audit_warning,
            prescription: PrescriptionView::derive(outcome.prescription, now, &engine.policy()).into(),
        })
    }

    /// Re-submit an audit event returned by a review whose audit write failed.
    pub fn retry_audit_event(&self, audit_event_json: String) -> Result<(), RxLifecycleError> {
        let event: AuditEvent = serde_json::from_str(&audit_event_json)?;
        let db = self.db.lock()?;
        let engine = PrescriptionEngine::with_database(&db, self.config.clone());
        Ok(engine.record_audit_event(&event)?)
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    /// Verify the audit chain.
    pub fn verify_audit_chain(&self) -> Result<FfiChainVerification, RxLifecycleError> {
        let db = self.db.lock()?;
        let verification = AuditTrail::new(&db).verify()?;
        Ok(verification.into())
    }

    /// Export the audit trail (optionally for one prescription) as JSON.
    pub fn export_audit_json(&self, target_id: Option<String>) -> Result<String, RxLifecycleError> {
        let db = self.db.lock()?;
        let exporter = export::AuditTrailExporter::new(&db);
        let batch = match target_id {
            Some(id) => exporter.export_for_target(&id, Utc::now())?,
            None => exporter.export_all(Utc::now())?,
        };
        Ok(batch.to_json()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe medicine line item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicineLineItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
}

impl From<MedicineLineItem> for FfiMedicineLineItem {
    fn from(item: MedicineLineItem) -> Self {
        Self {
            product_id: item.product_id,
            name: item.name,
            quantity: item.quantity,
        }
    }
}

impl From<FfiMedicineLineItem> for MedicineLineItem {
    fn from(item: FfiMedicineLineItem) -> Self {
        MedicineLineItem {
            product_id: item.product_id,
            name: item.name,
            quantity: item.quantity,
        }
    }
}

/// FFI-safe upload. Dates are `YYYY-MM-DD`, instants RFC 3339.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrescriptionUpload {
    pub user_id: String,
    pub patient_name: String,
    pub doctor_name: String,
    pub prescription_date: Option<String>,
    pub hospital_clinic: Option<String>,
    pub expires_at: Option<String>,
    pub medicines: Vec<FfiMedicineLineItem>,
}

impl TryFrom<FfiPrescriptionUpload> for PrescriptionUpload {
    type Error = RxLifecycleError;

    fn try_from(upload: FfiPrescriptionUpload) -> Result<Self, Self::Error> {
        let prescription_date = upload
            .prescription_date
            .as_deref()
            .map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|e| RxLifecycleError::InvalidInput(format!("prescription_date: {}", e)))
            })
            .transpose()?;
        let expires_at = upload
            .expires_at
            .as_deref()
            .map(|ts| {
                chrono::DateTime::parse_from_rfc3339(ts)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| RxLifecycleError::InvalidInput(format!("expires_at: {}", e)))
            })
            .transpose()?;

        Ok(PrescriptionUpload {
            user_id: upload.user_id,
            patient_name: upload.patient_name,
            doctor_name: upload.doctor_name,
            prescription_date,
            hospital_clinic: upload.hospital_clinic,
            expires_at,
            medicines: upload.medicines.into_iter().map(|m| m.into()).collect(),
        })
    }
}

/// FFI-safe prescription with its derived status.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrescription {
    pub id: String,
    pub reference_number: String,
    pub user_id: String,
    pub patient_name: String,
    pub doctor_name: String,
    pub prescription_date: Option<String>,
    pub hospital_clinic: Option<String>,
    pub status: String,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub derived_status: String,
    pub expires_at: Option<String>,
    pub is_reorderable: bool,
    pub days_left: Option<i64>,
}

impl From<PrescriptionView> for FfiPrescription {
    fn from(view: PrescriptionView) -> Self {
        let record = view.prescription;
        Self {
            id: record.id,
            reference_number: record.reference_number,
            user_id: record.user_id,
            patient_name: record.patient_name,
            doctor_name: record.doctor_name,
            prescription_date: record.prescription_date.map(|d| d.format("%Y-%m-%d").to_string()),
            hospital_clinic: record.hospital_clinic,
            status: record.status.as_str().to_uppercase(),
            admin_notes: record.admin_notes,
            reviewed_by: record.reviewed_by,
            reviewed_at: record.reviewed_at.map(|t| t.to_rfc3339()),
            created_at: record.created_at.to_rfc3339(),
            derived_status: view.lifecycle.derived_status.as_str().to_string(),
            expires_at: view.lifecycle.expires_at.map(|t| t.to_rfc3339()),
            is_reorderable: view.lifecycle.is_reorderable,
            days_left: view.lifecycle.days_left,
        }
    }
}

/// FFI-safe review result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReviewOutcome {
    pub prescription: FfiPrescription,
    /// Pass to `retry_audit_event` when `audit_warning` is set
    pub audit_event_json: String,
    pub audit_warning: Option<String>,
}

/// FFI-safe status counts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStatusSummary {
    pub total: u32,
    pub active: u32,
    pub expiring: u32,
    pub expired: u32,
    pub pending: u32,
    pub rejected: u32,
    pub reorderable: u32,
}

impl From<StatusSummary> for FfiStatusSummary {
    fn from(summary: StatusSummary) -> Self {
        Self {
            total: summary.total,
            active: summary.active,
            expiring: summary.expiring,
            expired: summary.expired,
            pending: summary.pending,
            rejected: summary.rejected,
            reorderable: summary.reorderable,
        }
    }
}

/// FFI-safe chain verification.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChainVerification {
    pub valid: bool,
    pub entry_count: u32,
    pub head_hash: Option<String>,
    pub first_broken_seq: Option<i64>,
}

impl From<ChainVerification> for FfiChainVerification {
    fn from(v: ChainVerification) -> Self {
        Self {
            valid: v.valid,
            entry_count: v.entry_count,
            head_hash: v.head_hash,
            first_broken_seq: v.first_broken_seq,
        }
    }
}
