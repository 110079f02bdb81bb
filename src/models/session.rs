use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SessionId, Timesheet, TimesheetId, WorkerId};

/// A worker's continuous on-duty period. Timesheets chain inside it through
/// job switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub worker_id: WorkerId,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub current_timesheet_id: Option<TimesheetId>,
}

impl Session {
    pub fn new(id: SessionId, worker_id: WorkerId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            worker_id,
            created_at,
            ended_at: None,
            current_timesheet_id: None,
        }
    }

    /// Rebuilds the active session that owns `timesheet` when only the
    /// gateway still knows about it. The session's own creation time is not
    /// part of a timesheet, so the timesheet start stands in for it.
    pub fn recovered_from(timesheet: &Timesheet) -> Self {
        Self {
            id: timesheet.session_id.clone(),
            worker_id: timesheet.worker_id.clone(),
            created_at: timesheet.start_time,
            ended_at: None,
            current_timesheet_id: timesheet.is_open().then_some(timesheet.id),
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}
