//! Audit log database operations.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{format_timestamp, parse_timestamp, Database, DbError, DbResult};
use crate::models::AuditEvent;

/// A stored audit log row.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogEntry {
    pub seq: i64,
    pub entry_hash: String,
    pub prev_hash: Option<String>,
    pub action: String,
    pub target_id: String,
    pub actor: String,
    /// Canonical JSON of the event, exactly as hashed
    pub payload: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Decode the stored event.
    pub fn event(&self) -> Result<AuditEvent, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

impl Database {
    /// Hash of the most recent audit entry.
    pub fn last_audit_hash(&self) -> DbResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry_hash FROM audit_log ORDER BY seq DESC LIMIT 1")?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Append an audit entry. Returns its sequence number.
    pub fn insert_audit_entry(
        &self,
        entry_hash: &str,
        prev_hash: Option<&str>,
        event: &AuditEvent,
        payload: &str,
        recorded_at: &DateTime<Utc>,
    ) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO audit_log (
                entry_hash, prev_hash, action, target_type, target_id, actor, payload, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                entry_hash,
                prev_hash,
                event.action,
                event.target_type,
                event.target_id,
                event.actor,
                payload,
                format_timestamp(recorded_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// All audit entries in append order.
    pub fn list_audit_entries(&self) -> DbResult<Vec<AuditLogEntry>> {
        self.query_audit_entries("", None)
    }

    /// Audit entries for one target, in append order.
    pub fn list_audit_entries_for_target(&self, target_id: &str) -> DbResult<Vec<AuditLogEntry>> {
        self.query_audit_entries("WHERE target_id = ?1", Some(target_id))
    }

    pub fn count_audit_entries(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn query_audit_entries(&self, filter: &str, target_id: Option<&str>) -> DbResult<Vec<AuditLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT seq, entry_hash, prev_hash, action, target_id, actor, payload, recorded_at
            FROM audit_log
            {}
            ORDER BY seq ASC
            "#,
            filter
        ))?;

        let rows = match target_id {
            Some(id) => stmt.query_map([id], AuditRow::read)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], AuditRow::read)?.collect::<Result<Vec<_>, _>>()?,
        };

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }
}

/// Intermediate row struct for database mapping.
struct AuditRow {
    seq: i64,
    entry_hash: String,
    prev_hash: Option<String>,
    action: String,
    target_id: String,
    actor: String,
    payload: String,
    recorded_at: String,
}

impl AuditRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            entry_hash: row.get(1)?,
            prev_hash: row.get(2)?,
            action: row.get(3)?,
            target_id: row.get(4)?,
            actor: row.get(5)?,
            payload: row.get(6)?,
            recorded_at: row.get(7)?,
        })
    }
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = DbError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditLogEntry {
            seq: row.seq,
            entry_hash: row.entry_hash,
            prev_hash: row.prev_hash,
            action: row.action,
            target_id: row.target_id,
            actor: row.actor,
            payload: row.payload,
            recorded_at: parse_timestamp(&row.recorded_at)?,
        })
    }
}
