//! Reminder outbox database operations.

use rusqlite::{params, OptionalExtension};

use super::{format_timestamp, parse_timestamp, Database, DbError, DbResult};
use crate::collaborators::{CollaboratorResult, ReminderScheduler};
use crate::models::{ReminderChannel, ReminderHandle, ReminderRequest, ScheduledReminder};

impl Database {
    /// Queue a reminder for the notification service and return its handle.
    pub fn insert_reminder(&self, request: &ReminderRequest) -> DbResult<ReminderHandle> {
        let handle = ReminderHandle::new(uuid::Uuid::new_v4().to_string());
        self.conn.execute(
            r#"
            INSERT INTO reminders (handle, prescription_id, fire_at, channel, cancelled, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            "#,
            params![
                handle.id,
                request.prescription_id,
                format_timestamp(&request.fire_at),
                request.channel.as_str(),
                format_timestamp(&chrono::Utc::now()),
            ],
        )?;
        Ok(handle)
    }

    /// Mark a reminder cancelled. Returns `false` if unknown or already cancelled.
    pub fn cancel_reminder(&self, handle: &ReminderHandle) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE reminders SET cancelled = 1 WHERE handle = ? AND cancelled = 0",
            [&handle.id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a reminder by handle.
    pub fn get_reminder(&self, handle: &ReminderHandle) -> DbResult<Option<ScheduledReminder>> {
        self.conn
            .query_row(
                r#"
                SELECT handle, prescription_id, fire_at, channel, cancelled, created_at
                FROM reminders
                WHERE handle = ?
                "#,
                [&handle.id],
                ReminderRow::read,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List reminders for a prescription, earliest first.
    pub fn list_reminders(&self, prescription_id: &str) -> DbResult<Vec<ScheduledReminder>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT handle, prescription_id, fire_at, channel, cancelled, created_at
            FROM reminders
            WHERE prescription_id = ?
            ORDER BY fire_at ASC
            "#,
        )?;
        let rows = stmt.query_map([prescription_id], ReminderRow::read)?;

        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?.try_into()?);
        }
        Ok(reminders)
    }
}

impl ReminderScheduler for Database {
    fn schedule(&self, request: &ReminderRequest) -> CollaboratorResult<ReminderHandle> {
        Ok(self.insert_reminder(request)?)
    }

    fn cancel(&self, handle: &ReminderHandle) -> CollaboratorResult<bool> {
        Ok(self.cancel_reminder(handle)?)
    }
}

struct ReminderRow {
    handle: String,
    prescription_id: String,
    fire_at: String,
    channel: String,
    cancelled: bool,
    created_at: String,
}

impl ReminderRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            handle: row.get(0)?,
            prescription_id: row.get(1)?,
            fire_at: row.get(2)?,
            channel: row.get(3)?,
            cancelled: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl TryFrom<ReminderRow> for ScheduledReminder {
    type Error = DbError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let channel = ReminderChannel::parse(&row.channel)
            .ok_or_else(|| DbError::Constraint(format!("Unknown reminder channel: {}", row.channel)))?;

        Ok(ScheduledReminder {
            handle: ReminderHandle::new(row.handle),
            request: ReminderRequest {
                prescription_id: row.prescription_id,
                fire_at: parse_timestamp(&row.fire_at)?,
                channel,
            },
            cancelled: row.cancelled,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::accept_upload;
    use crate::models::PrescriptionUpload;
    use chrono::{Duration, NaiveDate, Utc};

    fn setup_db() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let upload = PrescriptionUpload {
            user_id: "user-1".into(),
            patient_name: "Rahim Uddin".into(),
            doctor_name: "Dr. Karim".into(),
            prescription_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        let record = accept_upload(&upload, "RX", Utc::now()).unwrap();
        db.insert_prescription(&record).unwrap();
        (db, record.id)
    }

    fn request(id: &str, days_from_now: i64) -> ReminderRequest {
        ReminderRequest {
            prescription_id: id.to_string(),
            fire_at: Utc::now() + Duration::days(days_from_now),
            channel: ReminderChannel::Email,
        }
    }

    #[test]
    fn test_schedule_and_get() {
        let (db, id) = setup_db();
        let req = request(&id, 5);
        let handle = db.insert_reminder(&req).unwrap();

        let stored = db.get_reminder(&handle).unwrap().unwrap();
        assert_eq!(stored.request, req);
        assert!(!stored.cancelled);
    }

    #[test]
    fn test_cancel_once() {
        let (db, id) = setup_db();
        let handle = db.insert_reminder(&request(&id, 5)).unwrap();

        assert!(db.cancel_reminder(&handle).unwrap());
        assert!(!db.cancel_reminder(&handle).unwrap());
        assert!(!db.cancel_reminder(&ReminderHandle::new("unknown")).unwrap());
        assert!(db.get_reminder(&handle).unwrap().unwrap().cancelled);
    }

    #[test]
    fn test_list_sorted_by_fire_time() {
        let (db, id) = setup_db();
        let late = db.insert_reminder(&request(&id, 9)).unwrap();
        let early = db.insert_reminder(&request(&id, 2)).unwrap();

        let reminders = db.list_reminders(&id).unwrap();
        assert_eq!(reminders.len(), 2);
        assert_eq!(reminders[0].handle, early);
        assert_eq!(reminders[1].handle, late);
    }

    #[test]
    fn test_reminder_for_unknown_prescription_fails() {
        let (db, _) = setup_db();
        assert!(db.insert_reminder(&request("ghost", 3)).is_err());
    }
}
