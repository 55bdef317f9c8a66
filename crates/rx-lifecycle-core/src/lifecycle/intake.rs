//! Turning an upload into a stored, pending prescription.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::models::{start_of_day, Prescription, PrescriptionStatus, PrescriptionUpload};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntakeError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Issue date is in the future")]
    IssueDateInFuture,

    #[error("Expiry must be after the issue date")]
    ExpiryNotAfterIssue,

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Validate an upload and build the pending record for it.
pub fn accept_upload(
    upload: &PrescriptionUpload,
    reference_prefix: &str,
    now: DateTime<Utc>,
) -> Result<Prescription, IntakeError> {
    require(&upload.user_id, "user_id")?;
    require(&upload.patient_name, "patient_name")?;
    require(&upload.doctor_name, "doctor_name")?;
    let issued = upload
        .prescription_date
        .ok_or(IntakeError::MissingField("prescription_date"))?;

    if issued > now.date_naive() {
        return Err(IntakeError::IssueDateInFuture);
    }
    if let Some(expires_at) = upload.expires_at {
        if expires_at <= start_of_day(issued) {
            return Err(IntakeError::ExpiryNotAfterIssue);
        }
    }

    let id = uuid::Uuid::new_v4();
    Ok(Prescription {
        id: id.to_string(),
        reference_number: reference_number(reference_prefix, &id, now),
        user_id: upload.user_id.trim().to_string(),
        patient_name: upload.patient_name.trim().to_string(),
        doctor_name: upload.doctor_name.trim().to_string(),
        prescription_date: Some(issued),
        hospital_clinic: upload
            .hospital_clinic
            .as_ref()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty()),
        status: PrescriptionStatus::Pending,
        admin_notes: None,
        expires_at: upload.expires_at,
        reviewed_by: None,
        reviewed_at: None,
        version: 0,
        created_at: now,
    })
}

/// `<PREFIX>-<YYYYMMDD>-<first 6 hex digits of the id>`
pub fn reference_number(prefix: &str, id: &uuid::Uuid, now: DateTime<Utc>) -> String {
    let hex = id.simple().to_string();
    format!(
        "{}-{}-{}",
        prefix.trim().to_uppercase(),
        now.format("%Y%m%d"),
        hex[..6].to_uppercase()
    )
}

fn require(value: &str, field: &'static str) -> Result<(), IntakeError> {
    if value.trim().is_empty() {
        Err(IntakeError::MissingField(field))
    } else {
        Ok(())
    }
}
