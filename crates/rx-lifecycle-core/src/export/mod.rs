//! Export of the audit trail for compliance inspections.

mod audit_trail;

pub use audit_trail::*;
