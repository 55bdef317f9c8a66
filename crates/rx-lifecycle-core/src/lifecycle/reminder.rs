//! Expiry reminder scheduling contract.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::status::derive_status;
use super::LifecyclePolicy;
use crate::collaborators::{CollaboratorError, ReminderScheduler};
use crate::models::{Prescription, ReminderChannel, ReminderHandle, ReminderRequest};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReminderError {
    #[error("Prescription not found: {0}")]
    NotFound(String),

    #[error("Reminders are only available for active or expiring prescriptions")]
    NotEligible,

    #[error("Cannot remind {requested} days before expiry; {available} days remain")]
    InvalidWindow { requested: i64, available: i64 },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl ReminderError {
    pub fn is_compliance_block(&self) -> bool {
        matches!(self, ReminderError::NotEligible)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ReminderError::NotFound(_) => "This prescription could not be found.",
            ReminderError::NotEligible => {
                "Reminders are only available for valid prescriptions. Please upload a new prescription."
            }
            ReminderError::InvalidWindow { .. } => {
                "Choose a reminder that falls before the prescription expires."
            }
            ReminderError::Collaborator(_) => "Reminders are temporarily unavailable. Please try again.",
        }
    }
}

/// Validate a reminder request and compute when it should fire.
///
/// `notify_before_days` must be at least 1 and no more than the whole days
/// left before expiry. The fire time is never earlier than `now`.
pub fn plan_reminder(
    record: &Prescription,
    notify_before_days: i64,
    channel: ReminderChannel,
    now: DateTime<Utc>,
    policy: &LifecyclePolicy,
) -> Result<ReminderRequest, ReminderError> {
    let view = derive_status(record, now, policy);
    if !view.derived_status.is_actionable() {
        return Err(ReminderError::NotEligible);
    }

    // Actionable statuses always carry an expiry and a day count.
    let (Some(expires_at), Some(available)) = (view.expires_at, view.days_left) else {
        return Err(ReminderError::NotEligible);
    };

    if notify_before_days < 1 || notify_before_days > available {
        return Err(ReminderError::InvalidWindow {
            requested: notify_before_days,
            available,
        });
    }

    // Counting whole days can put the nominal fire time earlier on today's date.
    let fire_at = (expires_at - Duration::days(notify_before_days)).max(now);

    Ok(ReminderRequest {
        prescription_id: record.id.clone(),
        fire_at,
        channel,
    })
}

/// Validate and hand the reminder to the notification collaborator.
pub fn schedule_reminder(
    record: &Prescription,
    notify_before_days: i64,
    channel: ReminderChannel,
    now: DateTime<Utc>,
    policy: &LifecyclePolicy,
    scheduler: &dyn ReminderScheduler,
) -> Result<ReminderHandle, ReminderError> {
    let request = match plan_reminder(record, notify_before_days, channel, now, policy) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(prescription_id = %record.id, error = %e, "Reminder refused");
            return Err(e);
        }
    };

    let handle = scheduler.schedule(&request)?;
    tracing::info!(
        prescription_id = %record.id,
        handle = %handle.id,
        fire_at = %request.fire_at,
        "Reminder scheduled"
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::test_support::{approved_on, at, issue_date};
    use crate::models::PrescriptionStatus;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingScheduler {
        requests: RefCell<Vec<ReminderRequest>>,
    }

    impl ReminderScheduler for RecordingScheduler {
        fn schedule(&self, request: &ReminderRequest) -> crate::collaborators::CollaboratorResult<ReminderHandle> {
            self.requests.borrow_mut().push(request.clone());
            Ok(ReminderHandle::new(format!("rem-{}", self.requests.borrow().len())))
        }

        fn cancel(&self, _handle: &ReminderHandle) -> crate::collaborators::CollaboratorResult<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_pending_not_eligible() {
        let mut record = approved_on(issue_date());
        record.status = PrescriptionStatus::Pending;

        let result = plan_reminder(&record, 5, ReminderChannel::Email, at(issue_date()), &LifecyclePolicy::default());
        let err = result.unwrap_err();
        assert_eq!(err, ReminderError::NotEligible);
        assert!(err.is_compliance_block());
    }

    #[test]
    fn test_expired_not_eligible() {
        let record = approved_on(issue_date());
        let now = at(issue_date()) + Duration::days(200);

        let result = plan_reminder(&record, 1, ReminderChannel::Email, now, &LifecyclePolicy::default());
        assert_eq!(result, Err(ReminderError::NotEligible));
    }

    #[test]
    fn test_window_longer_than_remaining() {
        let record = approved_on(issue_date());
        let now = at(issue_date()) + Duration::days(170);

        let result = plan_reminder(&record, 20, ReminderChannel::Sms, now, &LifecyclePolicy::default());
        assert_eq!(
            result,
            Err(ReminderError::InvalidWindow {
                requested: 20,
                available: 10
            })
        );
    }

    #[test]
    fn test_non_positive_window() {
        let record = approved_on(issue_date());
        for days in [0, -3] {
            let result = plan_reminder(&record, days, ReminderChannel::Email, at(issue_date()), &LifecyclePolicy::default());
            assert!(matches!(result, Err(ReminderError::InvalidWindow { .. })));
        }
    }

    #[test]
    fn test_fire_at_is_expiry_minus_lead_time() {
        let record = approved_on(issue_date());
        let now = at(issue_date()) + Duration::days(100);
        let scheduler = RecordingScheduler::default();

        let handle = schedule_reminder(&record, 7, ReminderChannel::Push, now, &LifecyclePolicy::default(), &scheduler)
            .unwrap();
        assert_eq!(handle.id, "rem-1");

        let requests = scheduler.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].fire_at, at(issue_date()) + Duration::days(173));
        assert_eq!(requests[0].channel, ReminderChannel::Push);
    }

    #[test]
    fn test_window_equal_to_remaining_is_allowed() {
        let record = approved_on(issue_date());
        let now = at(issue_date()) + Duration::days(170);

        let request = plan_reminder(&record, 10, ReminderChannel::Email, now, &LifecyclePolicy::default()).unwrap();
        assert_eq!(request.fire_at.date_naive(), now.date_naive());
    }

    #[test]
    fn test_full_window_later_in_the_day_fires_now() {
        let record = approved_on(issue_date());
        let now = at(issue_date()) + Duration::days(170) + Duration::hours(15);

        let request = plan_reminder(&record, 10, ReminderChannel::Email, now, &LifecyclePolicy::default()).unwrap();
        assert_eq!(request.fire_at, now);

        let request = plan_reminder(&record, 3, ReminderChannel::Email, now, &LifecyclePolicy::default()).unwrap();
        assert_eq!(request.fire_at, at(issue_date()) + Duration::days(177));
        assert!(request.fire_at > now);
    }
}
