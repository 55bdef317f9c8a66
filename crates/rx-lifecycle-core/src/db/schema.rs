//! SQLite schema definition.

/// Complete database schema for the prescription engine.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Prescriptions
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescriptions (
    id TEXT PRIMARY KEY,
    reference_number TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    patient_name TEXT NOT NULL,
    doctor_name TEXT NOT NULL,
    prescription_date TEXT,                      -- YYYY-MM-DD
    hospital_clinic TEXT,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'approved', 'rejected')),
    admin_notes TEXT,
    expires_at TEXT,                             -- explicit override (RFC 3339)
    reviewed_by TEXT,
    reviewed_at TEXT,
    version INTEGER NOT NULL DEFAULT 0,          -- optimistic concurrency token
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_user ON prescriptions(user_id);
CREATE INDEX IF NOT EXISTS idx_prescriptions_status ON prescriptions(status);

-- Decided records never change status again
CREATE TRIGGER IF NOT EXISTS prescriptions_status_final BEFORE UPDATE OF status ON prescriptions
WHEN old.status != 'pending' AND new.status != old.status
BEGIN
    SELECT RAISE(ABORT, 'Reviewed prescriptions are final');
END;

-- ============================================================================
-- Medicines captured with a prescription
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescription_medicines (
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    position INTEGER NOT NULL,
    product_id TEXT NOT NULL,
    name TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    PRIMARY KEY (prescription_id, position)
);

-- ============================================================================
-- Reminder outbox (delivered by the notification service)
-- ============================================================================

CREATE TABLE IF NOT EXISTS reminders (
    handle TEXT PRIMARY KEY,
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    fire_at TEXT NOT NULL,
    channel TEXT NOT NULL,
    cancelled INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reminders_prescription ON reminders(prescription_id);

-- ============================================================================
-- Audit log (Append-Only, hash-chained)
-- ============================================================================

CREATE TABLE IF NOT EXISTS audit_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_hash TEXT NOT NULL UNIQUE,             -- SHA-256(prev_hash || payload)
    prev_hash TEXT,                              -- NULL for the first entry
    action TEXT NOT NULL,
    target_type TEXT NOT NULL,
    target_id TEXT NOT NULL,
    actor TEXT NOT NULL,
    payload TEXT NOT NULL,                       -- canonical JSON of the event
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_target ON audit_log(target_id);

CREATE TRIGGER IF NOT EXISTS audit_log_no_update BEFORE UPDATE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'Audit log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_log_no_delete BEFORE DELETE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'Audit log is append-only');
END;
"#;
