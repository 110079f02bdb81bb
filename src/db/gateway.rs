use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::gateway::{Notification, TimesheetGateway};
use crate::location::LocationSink;
use crate::models::{
    Coordinate, LocationSample, Session, SessionId, Timesheet, TimesheetId, TimesheetPayload,
    WorkerId,
};

use super::Database;

/// Domain rejections travel inside `anyhow::Error` as a [`GatewayError`];
/// anything else means the store itself failed.
fn into_gateway_error(err: anyhow::Error) -> GatewayError {
    match err.downcast::<GatewayError>() {
        Ok(gateway_error) => gateway_error,
        Err(other) => GatewayError::Unavailable {
            reason: format!("{other:#}"),
        },
    }
}

#[async_trait]
impl TimesheetGateway for Database {
    async fn create_session(&self, worker_id: &WorkerId) -> Result<Session, GatewayError> {
        let session = Session::new(
            SessionId::new(Uuid::new_v4().to_string()),
            worker_id.clone(),
            Utc::now(),
        );
        self.insert_session(&session)
            .await
            .map_err(into_gateway_error)?;
        Ok(session)
    }

    async fn create_timesheet(&self, payload: TimesheetPayload) -> Result<Timesheet, GatewayError> {
        self.insert_timesheet(&payload)
            .await
            .map_err(into_gateway_error)
    }

    async fn close_timesheet(
        &self,
        timesheet_id: TimesheetId,
        end_time: DateTime<Utc>,
        end_coordinate: Option<Coordinate>,
    ) -> Result<Timesheet, GatewayError> {
        self.finish_timesheet(timesheet_id, end_time, end_coordinate)
            .await
            .map_err(into_gateway_error)
    }

    async fn find_open_timesheet(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Option<Timesheet>, GatewayError> {
        self.get_open_timesheets(worker_id)
            .await
            .map(|open| open.into_iter().next())
            .map_err(into_gateway_error)
    }

    async fn end_session(
        &self,
        session_id: &SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        self.mark_session_ended(session_id, ended_at)
            .await
            .map_err(into_gateway_error)
    }

    async fn notify(&self, notification: Notification) -> Result<(), GatewayError> {
        self.insert_notification(&notification)
            .await
            .map_err(into_gateway_error)
    }
}

#[async_trait]
impl LocationSink for Database {
    async fn record_sample(&self, sample: LocationSample) -> Result<()> {
        self.insert_location_sample(&sample).await
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::models::{PriorTimesheetClosure, WorkDetails, WorkVariant};

    fn open_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("fieldclock.sqlite3")).unwrap();
        (dir, db)
    }

    fn payload(session: &Session, variant: WorkVariant) -> TimesheetPayload {
        TimesheetPayload::fresh(
            session.worker_id.clone(),
            session.id.clone(),
            &WorkDetails::new("site-1", "02.300", variant),
            Utc::now(),
            Some(Coordinate::new(40.0, -111.9)),
        )
    }

    #[tokio::test]
    async fn switch_closes_prior_and_opens_next_in_one_call() {
        let (_dir, db) = open_db();
        let worker = WorkerId::new("w-7");
        let session = db.create_session(&worker).await.unwrap();

        let first = db
            .create_timesheet(payload(&session, WorkVariant::General))
            .await
            .unwrap();

        let closing = PriorTimesheetClosure {
            previous_timesheet_id: first.id,
            end_time: Utc::now(),
            end_coordinate: Some(Coordinate::new(40.1, -111.8)),
        };
        let second = db
            .create_timesheet(
                payload(
                    &session,
                    WorkVariant::TascoF {
                        material_type: "Gravel".into(),
                    },
                )
                .with_closing(closing),
            )
            .await
            .unwrap();

        let open = db.get_open_timesheets(&worker).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, second.id);
        assert_eq!(open[0].fields.labor_type.as_deref(), Some("FShift"));

        let closed = db.get_timesheet(first.id).await.unwrap().unwrap();
        assert!(closed.end_time.is_some());
        assert_eq!(closed.end_coordinate, Some(Coordinate::new(40.1, -111.8)));

        let stored = db.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.current_timesheet_id, Some(second.id));
    }

    #[tokio::test]
    async fn fresh_create_is_rejected_while_one_is_open() {
        let (_dir, db) = open_db();
        let session = db.create_session(&WorkerId::new("w-7")).await.unwrap();

        db.create_timesheet(payload(&session, WorkVariant::General))
            .await
            .unwrap();
        let err = db
            .create_timesheet(payload(&session, WorkVariant::General))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Rejected { .. }));
    }

    #[tokio::test]
    async fn closing_an_unknown_timesheet_fails_the_whole_switch() {
        let (_dir, db) = open_db();
        let worker = WorkerId::new("w-7");
        let session = db.create_session(&worker).await.unwrap();

        let err = db
            .create_timesheet(payload(&session, WorkVariant::General).with_closing(
                PriorTimesheetClosure {
                    previous_timesheet_id: TimesheetId(999),
                    end_time: Utc::now(),
                    end_coordinate: None,
                },
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::PriorTimesheetNotClosed { .. }));
        assert!(db.get_open_timesheets(&worker).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_session_ends_an_abandoned_one() {
        let (_dir, db) = open_db();
        let worker = WorkerId::new("w-7");

        let abandoned = db.create_session(&worker).await.unwrap();
        let replacement = db.create_session(&worker).await.unwrap();

        let active = db.get_active_session(&worker).await.unwrap().unwrap();
        assert_eq!(active.id, replacement.id);
        assert!(db
            .get_session(&abandoned.id)
            .await
            .unwrap()
            .unwrap()
            .ended_at
            .is_some());
    }

    #[tokio::test]
    async fn samples_and_notifications_are_stored() {
        let (_dir, db) = open_db();
        let session = db.create_session(&WorkerId::new("w-7")).await.unwrap();

        db.record_sample(LocationSample {
            worker_id: session.worker_id.clone(),
            session_id: session.id.clone(),
            coordinate: Coordinate::new(1.0, 2.0),
            recorded_at: Utc::now(),
        })
        .await
        .unwrap();
        db.notify(Notification {
            topic: "timecard-approval".into(),
            recipient: Some("mgr-1".into()),
            title: "Timesheet approval needed".into(),
            message: "switched".into(),
            link: "/dashboard/timesheets/1".into(),
            reference_id: "1".into(),
        })
        .await
        .unwrap();

        let samples = db.get_location_samples_for_session(&session.id).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].coordinate, Coordinate::new(1.0, 2.0));

        let outbox = db.list_notifications().await.unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].recipient.as_deref(), Some("mgr-1"));
    }
}
