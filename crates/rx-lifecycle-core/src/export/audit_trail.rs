//! Audit trail export with chain verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{verify_entries, AuditResult, ChainVerification};
use crate::db::{AuditLogEntry, Database};
use crate::models::AuditEvent;

pub const EXPORT_FORMAT_VERSION: &str = "1.0";
pub const HASH_ALGORITHM: &str = "SHA-256";

/// One exported audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedAuditEntry {
    pub seq: i64,
    pub entry_hash: String,
    pub prev_hash: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub event: AuditEvent,
}

/// Export metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditExportMetadata {
    pub format_version: String,
    pub exported_at: DateTime<Utc>,
    pub hash_algorithm: String,
    /// Target the export was restricted to, if any
    pub target_id: Option<String>,
    /// Exporting system identifier
    pub system_id: Option<String>,
}

/// Audit trail export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrailExport {
    pub metadata: AuditExportMetadata,
    /// Verification of the whole chain at export time
    pub verification: ChainVerification,
    pub entries: Vec<ExportedAuditEntry>,
}

impl AuditTrailExport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Audit trail exporter.
pub struct AuditTrailExporter<'a> {
    db: &'a Database,
    system_id: Option<String>,
}

impl<'a> AuditTrailExporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db, system_id: None }
    }

    /// Set the system identifier for exports.
    pub fn with_system_id(mut self, system_id: String) -> Self {
        self.system_id = Some(system_id);
        self
    }

    /// Export every entry.
    pub fn export_all(&self, now: DateTime<Utc>) -> AuditResult<AuditTrailExport> {
        let entries = self.db.list_audit_entries()?;
        let verification = verify_entries(&entries);
        self.build(entries, verification, None, now)
    }

    /// Export the entries for one prescription. The chain is still verified in full.
    pub fn export_for_target(&self, target_id: &str, now: DateTime<Utc>) -> AuditResult<AuditTrailExport> {
        let verification = verify_entries(&self.db.list_audit_entries()?);
        let entries = self.db.list_audit_entries_for_target(target_id)?;
        self.build(entries, verification, Some(target_id.to_string()), now)
    }

    fn build(
        &self,
        entries: Vec<AuditLogEntry>,
        verification: ChainVerification,
        target_id: Option<String>,
        now: DateTime<Utc>,
    ) -> AuditResult<AuditTrailExport> {
        let mut exported = Vec::with_capacity(entries.len());
        for entry in entries {
            let event = entry.event()?;
            exported.push(ExportedAuditEntry {
                seq: entry.seq,
                entry_hash: entry.entry_hash,
                prev_hash: entry.prev_hash,
                recorded_at: entry.recorded_at,
                event,
            });
        }

        Ok(AuditTrailExport {
            metadata: AuditExportMetadata {
                format_version: EXPORT_FORMAT_VERSION.to_string(),
                exported_at: now,
                hash_algorithm: HASH_ALGORITHM.to_string(),
                target_id,
                system_id: self.system_id.clone(),
            },
            verification,
            entries: exported,
        })
    }
}
