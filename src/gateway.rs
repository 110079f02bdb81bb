//! Boundary to the remote data service that owns sessions, timesheets and
//! notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::models::{
    Coordinate, Session, SessionId, Timesheet, TimesheetId, TimesheetPayload, WorkerId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub topic: String,
    /// Addressee within the topic, usually the worker's manager.
    pub recipient: Option<String>,
    pub title: String,
    pub message: String,
    pub link: String,
    pub reference_id: String,
}

#[async_trait]
pub trait TimesheetGateway: Send + Sync {
    async fn create_session(&self, worker_id: &WorkerId) -> Result<Session, GatewayError>;

    /// Creates a timesheet. When `payload.closing` is set the gateway closes the
    /// previous timesheet and opens the new one as a single unit.
    async fn create_timesheet(&self, payload: TimesheetPayload) -> Result<Timesheet, GatewayError>;

    async fn close_timesheet(
        &self,
        timesheet_id: TimesheetId,
        end_time: DateTime<Utc>,
        end_coordinate: Option<Coordinate>,
    ) -> Result<Timesheet, GatewayError>;

    async fn find_open_timesheet(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Option<Timesheet>, GatewayError>;

    async fn end_session(
        &self,
        session_id: &SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    async fn notify(&self, notification: Notification) -> Result<(), GatewayError>;
}
