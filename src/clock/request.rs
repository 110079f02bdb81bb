use serde::{Deserialize, Serialize};

use crate::error::ClockInError;
use crate::models::{SessionId, Timesheet, TimesheetId, WorkDetails, WorkerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClockAction {
    /// Opens the first timesheet of a session.
    Start,
    /// Closes the open timesheet and opens the next one in the same session.
    Switch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockInRequest {
    pub worker_id: Option<WorkerId>,
    pub action: ClockAction,
    pub details: WorkDetails,
    /// Recipient of the approval notification sent after a switch.
    #[serde(default)]
    pub manager_id: Option<String>,
}

impl ClockInRequest {
    pub fn start(worker_id: impl Into<WorkerId>, details: WorkDetails) -> Self {
        Self {
            worker_id: Some(worker_id.into()),
            action: ClockAction::Start,
            details,
            manager_id: None,
        }
    }

    pub fn switch(worker_id: impl Into<WorkerId>, details: WorkDetails) -> Self {
        Self {
            worker_id: Some(worker_id.into()),
            action: ClockAction::Switch,
            details,
            manager_id: None,
        }
    }

    pub fn with_manager(mut self, manager_id: impl Into<String>) -> Self {
        self.manager_id = Some(manager_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockInReceipt {
    pub session_id: SessionId,
    pub timesheet: Timesheet,
    pub tracking_started: bool,
    /// Set on switches: the timesheet that was closed.
    pub closed_timesheet_id: Option<TimesheetId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockOutReceipt {
    pub session_id: SessionId,
    pub timesheet: Timesheet,
}

/// What the UI layer sees for a clock action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClockInOutcome {
    Success {
        session_id: SessionId,
        timesheet_id: TimesheetId,
    },
    Failed {
        error: ClockInError,
        message: String,
        retryable: bool,
    },
}

impl ClockInOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ClockInOutcome::Success { .. })
    }

    pub fn timesheet_id(&self) -> Option<TimesheetId> {
        match self {
            ClockInOutcome::Success { timesheet_id, .. } => Some(*timesheet_id),
            ClockInOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ClockInError> {
        match self {
            ClockInOutcome::Success { .. } => None,
            ClockInOutcome::Failed { error, .. } => Some(error),
        }
    }
}

impl From<Result<ClockInReceipt, ClockInError>> for ClockInOutcome {
    fn from(result: Result<ClockInReceipt, ClockInError>) -> Self {
        match result {
            Ok(receipt) => ClockInOutcome::Success {
                session_id: receipt.session_id,
                timesheet_id: receipt.timesheet.id,
            },
            Err(error) => ClockInOutcome::Failed {
                message: error.user_message().to_string(),
                retryable: error.is_retryable(),
                error,
            },
        }
    }
}
