//! End-to-end lifecycle tests against a SQLite-backed engine.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use rx_lifecycle_core::audit::AuditTrail;
use rx_lifecycle_core::collaborators::{CollaboratorResult, PrescriptionStore};
use rx_lifecycle_core::config::EngineConfig;
use rx_lifecycle_core::db::Database;
use rx_lifecycle_core::lifecycle::{
    PrescriptionEngine, ReminderError, ReorderError, ReviewError,
};
use rx_lifecycle_core::models::{
    start_of_day, DerivedStatus, MedicineLineItem, Prescription, PrescriptionStatus,
    PrescriptionUpload, ReminderChannel, ReviewDecision,
};

fn issue_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn day(offset: i64) -> DateTime<Utc> {
    start_of_day(issue_date()) + Duration::days(offset) + Duration::hours(11)
}

fn upload() -> PrescriptionUpload {
    PrescriptionUpload {
        user_id: "user-1".into(),
        patient_name: "Rahim Uddin".into(),
        doctor_name: "Dr. Karim".into(),
        prescription_date: Some(issue_date()),
        hospital_clinic: Some("Square Hospital".into()),
        expires_at: None,
        medicines: vec![
            MedicineLineItem::new("napa-500", "Napa 500mg", 20),
            MedicineLineItem::new("seclo-20", "Seclo 20mg", 14),
        ],
    }
}

/// Submit and approve a prescription issued on `issue_date()`.
fn approved(engine: &PrescriptionEngine<'_>) -> Prescription {
    let record = engine.submit(&upload(), day(0)).unwrap();
    engine
        .review(&record.id, ReviewDecision::Approve, None, "admin-1", day(0))
        .unwrap()
        .prescription
}

#[test]
fn test_expiring_prescription_is_reorderable() {
    let db = Database::open_in_memory().unwrap();
    let engine = PrescriptionEngine::with_database(&db, EngineConfig::default());
    let record = approved(&engine);

    let view = engine.get(&record.id, day(170)).unwrap().unwrap();
    assert_eq!(view.lifecycle.days_left, Some(10));
    assert_eq!(view.lifecycle.derived_status, DerivedStatus::Expiring);
    assert!(view.lifecycle.is_reorderable);

    let items = engine.request_reorder(&record.id, day(170)).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].product_id, "napa-500");
    assert_eq!(items[1].quantity, 14);
}

#[test]
fn test_expired_prescription_blocks_reorder() {
    let db = Database::open_in_memory().unwrap();
    let engine = PrescriptionEngine::with_database(&db, EngineConfig::default());
    let record = approved(&engine);

    let view = engine.get(&record.id, day(181)).unwrap().unwrap();
    assert_eq!(view.lifecycle.derived_status, DerivedStatus::Expired);
    assert!(!view.lifecycle.is_reorderable);

    let err = engine.request_reorder(&record.id, day(181)).unwrap_err();
    assert_eq!(err, ReorderError::Expired);
    assert!(err.is_compliance_block());

    // Stored record is untouched by the passage of time.
    let stored = db.get_prescription(&record.id).unwrap().unwrap();
    assert_eq!(stored, record);
}

#[test]
fn test_pending_prescription_cannot_be_reminded() {
    let db = Database::open_in_memory().unwrap();
    let engine = PrescriptionEngine::with_database(&db, EngineConfig::default());
    let record = engine.submit(&upload(), day(0)).unwrap();

    for offset in [0, 90, 400] {
        let view = engine.get(&record.id, day(offset)).unwrap().unwrap();
        assert_eq!(view.lifecycle.derived_status, DerivedStatus::Pending);
        assert!(!view.lifecycle.is_reorderable);
    }

    assert_eq!(
        engine.schedule_reminder(&record.id, 3, None, day(10)),
        Err(ReminderError::NotEligible)
    );
    assert_eq!(
        engine.request_reorder(&record.id, day(10)),
        Err(ReorderError::NotApproved)
    );
    assert!(db.list_reminders(&record.id).unwrap().is_empty());
}

#[test]
fn test_reject_then_review_again() {
    let db = Database::open_in_memory().unwrap();
    let engine = PrescriptionEngine::with_database(&db, EngineConfig::default());
    let record = engine.submit(&upload(), day(0)).unwrap();

    let outcome = engine
        .review(
            &record.id,
            ReviewDecision::Reject,
            Some("invalid image".into()),
            "admin-1",
            day(1),
        )
        .unwrap();
    assert!(outcome.audit_recorded());
    assert_eq!(outcome.prescription.status, PrescriptionStatus::Rejected);
    assert_eq!(outcome.prescription.admin_notes.as_deref(), Some("invalid image"));

    let trail = AuditTrail::new(&db);
    let events = trail.events_for(&record.id).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].decision(), Some(ReviewDecision::Reject));
    assert_eq!(events[0].actor, "admin-1");

    let again = engine.review(&record.id, ReviewDecision::Approve, None, "admin-2", day(2));
    assert_eq!(again, Err(ReviewError::AlreadyFinal));
    assert_eq!(db.count_audit_entries().unwrap(), 1);

    let view = engine.get(&record.id, day(2)).unwrap().unwrap();
    assert_eq!(view.lifecycle.derived_status, DerivedStatus::Rejected);
}

#[test]
fn test_reminder_window_longer_than_remaining() {
    let db = Database::open_in_memory().unwrap();
    let engine = PrescriptionEngine::with_database(&db, EngineConfig::default());
    let record = approved(&engine);

    assert_eq!(
        engine.schedule_reminder(&record.id, 20, None, day(170)),
        Err(ReminderError::InvalidWindow {
            requested: 20,
            available: 10
        })
    );

    let handle = engine
        .schedule_reminder(&record.id, 7, Some(ReminderChannel::Sms), day(170))
        .unwrap();
    let reminders = db.list_reminders(&record.id).unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].handle, handle);
    assert_eq!(reminders[0].request.fire_at, start_of_day(issue_date()) + Duration::days(173));

    assert!(engine.cancel_reminder(&handle).unwrap());
    assert!(!engine.cancel_reminder(&handle).unwrap());
}

/// Store that keeps handing out the snapshot it saw first, like a reviewer
/// whose page was loaded before a colleague's decision landed.
struct StaleStore<'a> {
    db: &'a Database,
    snapshot: Prescription,
}

impl PrescriptionStore for StaleStore<'_> {
    fn insert(&self, record: &Prescription, medicines: &[MedicineLineItem]) -> CollaboratorResult<()> {
        self.db.insert(record, medicines)
    }

    fn get(&self, _id: &str) -> CollaboratorResult<Option<Prescription>> {
        Ok(Some(self.snapshot.clone()))
    }

    fn list_for_user(&self, user_id: &str) -> CollaboratorResult<Vec<Prescription>> {
        self.db.list_for_user(user_id)
    }

    fn list_by_status(&self, status: PrescriptionStatus) -> CollaboratorResult<Vec<Prescription>> {
        self.db.list_by_status(status)
    }

    fn commit_review(&self, updated: &Prescription, expected_version: i64) -> CollaboratorResult<bool> {
        self.db.commit_review(updated, expected_version)
    }
}

#[test]
fn test_concurrent_reviews_single_winner() {
    let db = Database::open_in_memory().unwrap();
    let engine = PrescriptionEngine::with_database(&db, EngineConfig::default());
    let pending = engine.submit(&upload(), day(0)).unwrap();

    let stale = StaleStore {
        db: &db,
        snapshot: pending.clone(),
    };
    let late_engine = PrescriptionEngine::new(&stale, &db, &db, &db, EngineConfig::default());

    engine
        .review(&pending.id, ReviewDecision::Approve, None, "admin-1", day(0))
        .unwrap();
    let late = late_engine.review(&pending.id, ReviewDecision::Reject, None, "admin-2", day(0));
    assert_eq!(late, Err(ReviewError::AlreadyFinal));

    let stored = db.get_prescription(&pending.id).unwrap().unwrap();
    assert_eq!(stored.status, PrescriptionStatus::Approved);
    assert_eq!(stored.reviewed_by.as_deref(), Some("admin-1"));
    assert_eq!(db.count_audit_entries().unwrap(), 1);
}

#[test]
fn test_pending_queue_drains_on_review() {
    let db = Database::open_in_memory().unwrap();
    let engine = PrescriptionEngine::with_database(&db, EngineConfig::default());

    let first = engine.submit(&upload(), day(0)).unwrap();
    let second = engine.submit(&upload(), day(1)).unwrap();

    let queue = engine.list_pending_reviews(day(2)).unwrap();
    let ids: Vec<_> = queue.iter().map(|v| v.prescription.id.as_str()).collect();
    assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);

    engine
        .review(&first.id, ReviewDecision::Approve, None, "admin-1", day(2))
        .unwrap();
    let queue = engine.list_pending_reviews(day(2)).unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].prescription.id, second.id);
}

#[test]
fn test_audit_chain_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rx.db");

    let ids: Vec<String> = {
        let db = Database::open(&path).unwrap();
        let engine = PrescriptionEngine::with_database(&db, EngineConfig::default());
        (0..3)
            .map(|i| {
                let record = engine.submit(&upload(), day(i)).unwrap();
                let decision = if i % 2 == 0 {
                    ReviewDecision::Approve
                } else {
                    ReviewDecision::Reject
                };
                engine
                    .review(&record.id, decision, None, "admin-1", day(i))
                    .unwrap();
                record.id
            })
            .collect()
    };

    let db = Database::open(&path).unwrap();
    let verification = AuditTrail::new(&db).verify().unwrap();
    assert!(verification.valid);
    assert_eq!(verification.entry_count, 3);
    assert!(verification.head_hash.is_some());

    let engine = PrescriptionEngine::with_database(&db, EngineConfig::default());
    let views = engine.list_for_user("user-1", day(5)).unwrap();
    assert_eq!(views.len(), 3);
    for id in &ids {
        assert!(views.iter().any(|v| &v.prescription.id == id));
    }
}

#[test]
fn test_shorter_validity_from_config() {
    let db = Database::open_in_memory().unwrap();
    let config = EngineConfig::from_json_str(r#"{"validity_days": 30, "expiring_window_days": 7}"#).unwrap();
    let engine = PrescriptionEngine::with_database(&db, config);
    let record = approved(&engine);

    let view = engine.get(&record.id, day(22)).unwrap().unwrap();
    assert_eq!(view.lifecycle.days_left, Some(8));
    assert_eq!(view.lifecycle.derived_status, DerivedStatus::Active);

    let view = engine.get(&record.id, day(23)).unwrap().unwrap();
    assert_eq!(view.lifecycle.derived_status, DerivedStatus::Expiring);

    let view = engine.get(&record.id, day(31)).unwrap().unwrap();
    assert_eq!(view.lifecycle.derived_status, DerivedStatus::Expired);
}
