//! Expiry reminder requests and handles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery channel requested for a reminder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReminderChannel {
    #[default]
    Email,
    Sms,
    Push,
}

impl ReminderChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderChannel::Email => "email",
            ReminderChannel::Sms => "sms",
            ReminderChannel::Push => "push",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Some(ReminderChannel::Email),
            "sms" => Some(ReminderChannel::Sms),
            "push" => Some(ReminderChannel::Push),
            _ => None,
        }
    }
}

/// Request forwarded to the notification collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderRequest {
    pub prescription_id: String,
    /// Instant the reminder should fire (expiry minus the lead time)
    pub fire_at: DateTime<Utc>,
    pub channel: ReminderChannel,
}

/// Opaque handle returned by the notification collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ReminderHandle {
    pub id: String,
}

impl ReminderHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A reminder as kept in the scheduler outbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledReminder {
    pub handle: ReminderHandle,
    pub request: ReminderRequest,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
}
