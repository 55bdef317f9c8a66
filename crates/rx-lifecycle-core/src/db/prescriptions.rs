//! Prescription database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_date, parse_timestamp, Database, DbError, DbResult};
use crate::collaborators::{CollaboratorResult, PrescriptionStore};
use crate::models::{MedicineLineItem, Prescription, PrescriptionStatus};

const SELECT_COLUMNS: &str = r#"
    SELECT id, reference_number, user_id, patient_name, doctor_name,
           prescription_date, hospital_clinic, status, admin_notes, expires_at,
           reviewed_by, reviewed_at, version, created_at
    FROM prescriptions
"#;

impl Database {
    /// Insert a new prescription.
    pub fn insert_prescription(&self, record: &Prescription) -> DbResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO prescriptions (
                    id, reference_number, user_id, patient_name, doctor_name,
                    prescription_date, hospital_clinic, status, admin_notes, expires_at,
                    reviewed_by, reviewed_at, version, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    record.id,
                    record.reference_number,
                    record.user_id,
                    record.patient_name,
                    record.doctor_name,
                    record.prescription_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    record.hospital_clinic,
                    record.status.as_str(),
                    record.admin_notes,
                    record.expires_at.as_ref().map(format_timestamp),
                    record.reviewed_by,
                    record.reviewed_at.as_ref().map(format_timestamp),
                    record.version,
                    format_timestamp(&record.created_at),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, msg)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    DbError::Constraint(msg.unwrap_or_else(|| err.to_string()))
                }
                other => DbError::Sqlite(other),
            })?;
        Ok(())
    }

    /// Insert a prescription together with its medicines, atomically.
    pub fn insert_prescription_with_medicines(
        &self,
        record: &Prescription,
        medicines: &[MedicineLineItem],
    ) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.insert_prescription(record)?;
        self.attach_medicines(&record.id, medicines)?;
        tx.commit()?;
        Ok(())
    }

    /// Get a prescription by ID.
    pub fn get_prescription(&self, id: &str) -> DbResult<Option<Prescription>> {
        self.conn
            .query_row(&format!("{} WHERE id = ?", SELECT_COLUMNS), [id], PrescriptionRow::read)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all prescriptions owned by a user.
    pub fn list_prescriptions_for_user(&self, user_id: &str) -> DbResult<Vec<Prescription>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE user_id = ? ORDER BY prescription_date DESC, created_at DESC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map([user_id], PrescriptionRow::read)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// List prescriptions by stored status.
    pub fn list_prescriptions_by_status(&self, status: PrescriptionStatus) -> DbResult<Vec<Prescription>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE status = ? ORDER BY created_at ASC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map([status.as_str()], PrescriptionRow::read)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// Store a review decision if the row is still pending at `expected_version`.
    ///
    /// Returns `false` when another review got there first.
    pub fn compare_and_set_review(&self, updated: &Prescription, expected_version: i64) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE prescriptions SET
                status = ?2,
                admin_notes = ?3,
                reviewed_by = ?4,
                reviewed_at = ?5,
                version = version + 1
            WHERE id = ?1 AND status = 'pending' AND version = ?6
            "#,
            params![
                updated.id,
                updated.status.as_str(),
                updated.admin_notes,
                updated.reviewed_by,
                updated.reviewed_at.as_ref().map(format_timestamp),
                expected_version,
            ],
        )?;
        Ok(rows_affected == 1)
    }

    /// Count prescriptions.
    pub fn count_prescriptions(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM prescriptions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl PrescriptionStore for Database {
    fn insert(&self, record: &Prescription, medicines: &[MedicineLineItem]) -> CollaboratorResult<()> {
        Ok(self.insert_prescription_with_medicines(record, medicines)?)
    }

    fn get(&self, id: &str) -> CollaboratorResult<Option<Prescription>> {
        Ok(self.get_prescription(id)?)
    }

    fn list_for_user(&self, user_id: &str) -> CollaboratorResult<Vec<Prescription>> {
        Ok(self.list_prescriptions_for_user(user_id)?)
    }

    fn list_by_status(&self, status: PrescriptionStatus) -> CollaboratorResult<Vec<Prescription>> {
        Ok(self.list_prescriptions_by_status(status)?)
    }

    fn commit_review(&self, updated: &Prescription, expected_version: i64) -> CollaboratorResult<bool> {
        Ok(self.compare_and_set_review(updated, expected_version)?)
    }
}

/// Intermediate row struct for database mapping.
struct PrescriptionRow {
    id: String,
    reference_number: String,
    user_id: String,
    patient_name: String,
    doctor_name: String,
    prescription_date: Option<String>,
    hospital_clinic: Option<String>,
    status: String,
    admin_notes: Option<String>,
    expires_at: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<String>,
    version: i64,
    created_at: String,
}

impl PrescriptionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            reference_number: row.get(1)?,
            user_id: row.get(2)?,
            patient_name: row.get(3)?,
            doctor_name: row.get(4)?,
            prescription_date: row.get(5)?,
            hospital_clinic: row.get(6)?,
            status: row.get(7)?,
            admin_notes: row.get(8)?,
            expires_at: row.get(9)?,
            reviewed_by: row.get(10)?,
            reviewed_at: row.get(11)?,
            version: row.get(12)?,
            created_at: row.get(13)?,
        })
    }
}

impl TryFrom<PrescriptionRow> for Prescription {
    type Error = DbError;

    fn try_from(row: PrescriptionRow) -> Result<Self, Self::Error> {
        let status = PrescriptionStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown prescription status: {}", row.status)))?;

        Ok(Prescription {
            id: row.id,
            reference_number: row.reference_number,
            user_id: row.user_id,
            patient_name: row.patient_name,
            doctor_name: row.doctor_name,
            prescription_date: row.prescription_date.as_deref().map(parse_date).transpose()?,
            hospital_clinic: row.hospital_clinic,
            status,
            admin_notes: row.admin_notes,
            expires_at: row.expires_at.as_deref().map(parse_timestamp).transpose()?,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at.as_deref().map(parse_timestamp).transpose()?,
            version: row.version,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
