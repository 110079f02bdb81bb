use serde::Serialize;
use thiserror::Error;

use crate::models::{SessionId, TimesheetId, WorkerId};

/// Failures reported by a [`TimesheetGateway`](crate::gateway::TimesheetGateway).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("request rejected: {reason}")]
    Rejected { reason: String },
    #[error("previous timesheet could not be closed: {reason}")]
    PriorTimesheetNotClosed { reason: String },
}

impl GatewayError {
    pub fn reason(&self) -> &str {
        match self {
            GatewayError::Unavailable { reason }
            | GatewayError::Rejected { reason }
            | GatewayError::PriorTimesheetNotClosed { reason } => reason,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("session {0} has already ended")]
    SessionEnded(SessionId),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackingError {
    #[error("location tracking could not start: {reason}")]
    StartFailed { reason: String },
}

/// Approval notifications are fire-and-forget; this only ever reaches the log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("approval notification for timesheet {timesheet_id} failed: {reason}")]
pub struct NotificationFailed {
    pub timesheet_id: TimesheetId,
    pub reason: String,
}

/// Every way a clock-in action can fail. Nothing else leaves the orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClockInError {
    #[error("worker id is missing")]
    MissingWorkerId,
    #[error("location permission denied")]
    LocationPermissionDenied,
    #[error("invalid work details: {message}")]
    InvalidWorkDetails { message: String },
    #[error("a clock action for worker {worker_id} is already in progress")]
    AlreadyInProgress { worker_id: WorkerId },
    #[error("session could not be resolved: {reason}")]
    SessionUnavailable { reason: String },
    #[error("location tracking failed to start: {reason}")]
    TrackingStartFailed { reason: String },
    #[error("timesheet {timesheet_id} is already open")]
    TimesheetAlreadyOpen { timesheet_id: TimesheetId },
    #[error("no active timesheet found")]
    NoActiveTimesheet,
    #[error("timesheet creation failed: {reason}")]
    TimesheetCreationFailed { reason: String },
    #[error("timesheet close failed: {reason}")]
    TimesheetCloseFailed { reason: String },
}

impl ClockInError {
    pub fn code(&self) -> &'static str {
        match self {
            ClockInError::MissingWorkerId => "missingWorkerId",
            ClockInError::LocationPermissionDenied => "locationPermissionDenied",
            ClockInError::InvalidWorkDetails { .. } => "invalidWorkDetails",
            ClockInError::AlreadyInProgress { .. } => "alreadyInProgress",
            ClockInError::SessionUnavailable { .. } => "sessionUnavailable",
            ClockInError::TrackingStartFailed { .. } => "trackingStartFailed",
            ClockInError::TimesheetAlreadyOpen { .. } => "timesheetAlreadyOpen",
            ClockInError::NoActiveTimesheet => "noActiveTimesheet",
            ClockInError::TimesheetCreationFailed { .. } => "timesheetCreationFailed",
            ClockInError::TimesheetCloseFailed { .. } => "timesheetCloseFailed",
        }
    }

    /// Retrying the same action is safe for these; session and tracking state
    /// are reused as they are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClockInError::AlreadyInProgress { .. }
                | ClockInError::SessionUnavailable { .. }
                | ClockInError::TimesheetCreationFailed { .. }
                | ClockInError::TimesheetCloseFailed { .. }
        )
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ClockInError::MissingWorkerId => "You need to be signed in to clock in.",
            ClockInError::LocationPermissionDenied => {
                "Location access is required to clock in. Enable it in settings."
            }
            ClockInError::InvalidWorkDetails { .. } => {
                "Some job details are missing. Check the form and try again."
            }
            ClockInError::AlreadyInProgress { .. } => "Still working on your last request.",
            ClockInError::SessionUnavailable { .. } => {
                "Could not start your work day. Please try again."
            }
            ClockInError::TrackingStartFailed { .. } => {
                "Cannot clock in: location tracking could not be started."
            }
            ClockInError::TimesheetAlreadyOpen { .. } => {
                "You are already clocked in. Switch jobs instead."
            }
            ClockInError::NoActiveTimesheet => {
                "No active timesheet found. Clock in normally instead."
            }
            ClockInError::TimesheetCreationFailed { .. } => {
                "Could not save your timesheet. Please try again."
            }
            ClockInError::TimesheetCloseFailed { .. } => {
                "Could not close your current timesheet. Please try again."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_level_failures_are_retryable() {
        assert!(ClockInError::TimesheetCreationFailed { reason: "503".into() }.is_retryable());
        assert!(ClockInError::TimesheetCloseFailed { reason: "503".into() }.is_retryable());
        assert!(!ClockInError::TrackingStartFailed { reason: "gps".into() }.is_retryable());
        assert!(!ClockInError::LocationPermissionDenied.is_retryable());
        assert!(!ClockInError::NoActiveTimesheet.is_retryable());
    }

    #[test]
    fn serializes_with_code_tag() {
        let value = serde_json::to_value(ClockInError::TimesheetAlreadyOpen {
            timesheet_id: TimesheetId(41),
        })
        .unwrap();
        assert_eq!(value["code"], "timesheetAlreadyOpen");
        assert_eq!(value["timesheetId"], 41);
        assert_eq!(
            ClockInError::TimesheetAlreadyOpen {
                timesheet_id: TimesheetId(41)
            }
            .code(),
            "timesheetAlreadyOpen"
        );
    }
}
