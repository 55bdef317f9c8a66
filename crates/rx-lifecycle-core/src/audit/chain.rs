//! Append-only audit chain.
//!
//! Each entry hashes the previous entry's hash together with the event's
//! canonical JSON, so editing or removing any stored entry breaks every
//! hash after it.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::collaborators::{AuditSink, CollaboratorResult};
use crate::db::{AuditLogEntry, Database};
use crate::models::AuditEvent;

/// Audit trail errors.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Audit chain broken at entry {0}")]
    ChainBroken(i64),
}

impl From<rusqlite::Error> for AuditError {
    fn from(e: rusqlite::Error) -> Self {
        AuditError::Database(e.into())
    }
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Result of appending an event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainAppend {
    pub seq: i64,
    pub entry_hash: String,
    pub prev_hash: Option<String>,
}

/// Result of walking the whole chain.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub entry_count: u32,
    /// Hash of the last entry
    pub head_hash: Option<String>,
    /// Sequence number of the first entry that failed verification
    pub first_broken_seq: Option<i64>,
}

/// Audit chain manager.
pub struct AuditTrail<'a> {
    db: &'a Database,
}

impl<'a> AuditTrail<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append an event to the chain.
    pub fn append(&self, event: &AuditEvent) -> AuditResult<ChainAppend> {
        let payload = event.to_canonical_json()?;

        // Read the head and insert in one transaction so two writers cannot
        // both chain onto the same head.
        let tx = self.db.conn().unchecked_transaction()?;
        let prev_hash = self.db.last_audit_hash()?;
        let entry_hash = hash_entry(prev_hash.as_deref(), &payload);
        let seq = self.db.insert_audit_entry(
            &entry_hash,
            prev_hash.as_deref(),
            event,
            &payload,
            &chrono::Utc::now(),
        )?;
        tx.commit()?;

        tracing::debug!(seq, action = %event.action, target_id = %event.target_id, "Audit event recorded");

        Ok(ChainAppend {
            seq,
            entry_hash,
            prev_hash,
        })
    }

    /// Walk the chain from the first entry and check every link.
    pub fn verify(&self) -> AuditResult<ChainVerification> {
        let entries = self.db.list_audit_entries()?;
        Ok(verify_entries(&entries))
    }

    /// Like [`AuditTrail::verify`] but fails on the first broken link.
    pub fn ensure_intact(&self) -> AuditResult<ChainVerification> {
        let verification = self.verify()?;
        match verification.first_broken_seq {
            Some(seq) => Err(AuditError::ChainBroken(seq)),
            None => Ok(verification),
        }
    }

    /// Decoded events for one target, oldest first.
    pub fn events_for(&self, target_id: &str) -> AuditResult<Vec<AuditEvent>> {
        self.db
            .list_audit_entries_for_target(target_id)?
            .iter()
            .map(|entry| entry.event().map_err(AuditError::from))
            .collect()
    }

    pub fn head(&self) -> AuditResult<Option<String>> {
        Ok(self.db.last_audit_hash()?)
    }
}

impl AuditSink for Database {
    fn record(&self, event: &AuditEvent) -> CollaboratorResult<()> {
        match AuditTrail::new(self).append(event) {
            Ok(_) => Ok(()),
            Err(AuditError::Database(e)) => Err(e.into()),
            Err(e) => Err(crate::collaborators::CollaboratorError::Rejected(e.to_string())),
        }
    }
}

/// SHA-256 over the previous hash (empty for the first entry) and the payload.
pub fn hash_entry(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.unwrap_or("").as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a sequence of entries in append order.
pub fn verify_entries(entries: &[AuditLogEntry]) -> ChainVerification {
    let mut expected_prev: Option<&str> = None;
    let mut first_broken_seq = None;

    for entry in entries {
        let linked = entry.prev_hash.as_deref() == expected_prev;
        let hashed = hash_entry(entry.prev_hash.as_deref(), &entry.payload) == entry.entry_hash;
        if !(linked && hashed) {
            first_broken_seq = Some(entry.seq);
            break;
        }
        expected_prev = Some(entry.entry_hash.as_str());
    }

    ChainVerification {
        valid: first_broken_seq.is_none(),
        entry_count: entries.len() as u32,
        head_hash: entries.last().map(|e| e.entry_hash.clone()),
        first_broken_seq,
    }
}
