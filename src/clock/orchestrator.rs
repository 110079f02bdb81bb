use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex as StdMutex},
};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::ClockConfig;
use crate::error::{ClockInError, GatewayError, NotificationFailed};
use crate::gateway::{Notification, TimesheetGateway};
use crate::location::{CoordinateProvider, LocationSink, LocationTrackingController};
use crate::models::{
    Coordinate, PriorTimesheetClosure, Session, SessionId, Timesheet, TimesheetId,
    TimesheetPayload, WorkDetails, WorkerId,
};
use crate::session::SessionRegistry;

use super::request::{ClockAction, ClockInOutcome, ClockInReceipt, ClockInRequest, ClockOutReceipt};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Drives session resolution, location tracking and the timesheet gateway for
/// every clock action, whatever the worker type.
pub struct ClockInOrchestrator {
    registry: Arc<SessionRegistry>,
    tracking: Arc<LocationTrackingController>,
    gateway: Arc<dyn TimesheetGateway>,
    coordinates: Arc<dyn CoordinateProvider>,
    config: ClockConfig,
    in_flight: StdMutex<HashSet<WorkerId>>,
    /// Starts that got as far as tracking but failed at the gateway, keyed by
    /// worker. A retry picks the session back up from here.
    pending_starts: Mutex<HashMap<WorkerId, SessionId>>,
}

/// Holds a worker's in-flight slot until dropped.
struct InFlightGuard<'a> {
    in_flight: &'a StdMutex<HashSet<WorkerId>>,
    worker_id: WorkerId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut set = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.remove(&self.worker_id);
    }
}

impl ClockInOrchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        tracking: Arc<LocationTrackingController>,
        gateway: Arc<dyn TimesheetGateway>,
        coordinates: Arc<dyn CoordinateProvider>,
        config: ClockConfig,
    ) -> Self {
        Self {
            registry,
            tracking,
            gateway,
            coordinates,
            config,
            in_flight: StdMutex::new(HashSet::new()),
            pending_starts: Mutex::new(HashMap::new()),
        }
    }

    /// Builds the registry and tracking controller from the three external
    /// collaborators.
    pub fn assemble(
        gateway: Arc<dyn TimesheetGateway>,
        coordinates: Arc<dyn CoordinateProvider>,
        sink: Arc<dyn LocationSink>,
        config: ClockConfig,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(gateway.clone()));
        let tracking = Arc::new(LocationTrackingController::new(
            coordinates.clone(),
            sink,
            config.tracking.clone(),
        ));
        Self::new(registry, tracking, gateway, coordinates, config)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn tracking(&self) -> &Arc<LocationTrackingController> {
        &self.tracking
    }

    /// UI entry point. Every failure comes back as [`ClockInOutcome::Failed`].
    pub async fn run(&self, request: ClockInRequest) -> ClockInOutcome {
        let worker_id = request.worker_id.as_ref();
        let result = match request.action {
            ClockAction::Start => self.start(worker_id, &request.details).await,
            ClockAction::Switch => {
                self.switch_job(worker_id, &request.details, request.manager_id.as_deref())
                    .await
            }
        };

        if let Err(err) = &result {
            log_warn!(
                "{:?} for worker {} failed: {err}",
                request.action,
                worker_id.map(WorkerId::as_str).unwrap_or("<none>")
            );
        }
        ClockInOutcome::from(result)
    }

    /// Opens the first timesheet of a session.
    pub async fn start(
        &self,
        worker_id: Option<&WorkerId>,
        details: &WorkDetails,
    ) -> Result<ClockInReceipt, ClockInError> {
        let worker_id = require_worker(worker_id)?;
        details
            .validate()
            .map_err(|message| ClockInError::InvalidWorkDetails { message })?;
        if !self.coordinates.permission_granted() {
            return Err(ClockInError::LocationPermissionDenied);
        }

        let _guard = self.claim(worker_id)?;

        let (session, resumed) = match self.resume_pending_start(worker_id).await {
            Some(session) => (session, true),
            None => {
                if self.registry.active_session(worker_id).await.is_none() {
                    // Nothing known locally; an open timesheet may survive from an
                    // earlier process and must not be shadowed by a new session.
                    if let Some(session) = self.recover_session(worker_id).await {
                        if let Some(timesheet_id) = session.current_timesheet_id {
                            return Err(ClockInError::TimesheetAlreadyOpen { timesheet_id });
                        }
                    }
                }
                let session = self
                    .registry
                    .resolve_or_create_session(worker_id)
                    .await
                    .map_err(|err| ClockInError::SessionUnavailable {
                        reason: err.to_string(),
                    })?;
                (session, false)
            }
        };

        if let Some(timesheet_id) = session.current_timesheet_id {
            self.confirm_still_open(worker_id, &session.id, timesheet_id)
                .await?;
        }

        let coordinate = self.sample_coordinate(worker_id).await;

        // Tracking has to be confirmed before any timesheet exists.
        let tracking_started = if resumed {
            false
        } else {
            self.ensure_tracking(worker_id, &session.id).await?
        };

        let payload = TimesheetPayload::fresh(
            worker_id.clone(),
            session.id.clone(),
            details,
            Utc::now(),
            coordinate,
        );

        let timesheet = match self.gateway.create_timesheet(payload).await {
            Ok(timesheet) => timesheet,
            Err(err) => {
                self.pending_starts
                    .lock()
                    .await
                    .insert(worker_id.clone(), session.id.clone());
                return Err(ClockInError::TimesheetCreationFailed {
                    reason: err.to_string(),
                });
            }
        };

        self.pending_starts.lock().await.remove(worker_id);
        self.record_current(&session.id, timesheet.id).await;

        log_info!(
            "worker {} clocked in on timesheet {} (session {})",
            worker_id,
            timesheet.id,
            session.id
        );

        Ok(ClockInReceipt {
            session_id: session.id,
            timesheet,
            tracking_started,
            closed_timesheet_id: None,
        })
    }

    /// Closes the open timesheet and opens the next one in a single gateway
    /// call. Tracking keeps running untouched.
    pub async fn switch_job(
        &self,
        worker_id: Option<&WorkerId>,
        details: &WorkDetails,
        manager_id: Option<&str>,
    ) -> Result<ClockInReceipt, ClockInError> {
        let worker_id = require_worker(worker_id)?;
        details
            .validate()
            .map_err(|message| ClockInError::InvalidWorkDetails { message })?;

        let _guard = self.claim(worker_id)?;

        let session = self.session_for_update(worker_id).await?;
        let previous_timesheet_id = self.open_timesheet_id(worker_id, &session).await?;

        let end_coordinate = self.sample_coordinate(worker_id).await;
        let switched_at = Utc::now();

        let payload = TimesheetPayload::fresh(
            worker_id.clone(),
            session.id.clone(),
            details,
            switched_at,
            end_coordinate,
        )
        .with_closing(PriorTimesheetClosure {
            previous_timesheet_id,
            end_time: switched_at,
            end_coordinate,
        });

        let timesheet = match self.gateway.create_timesheet(payload).await {
            Ok(timesheet) => timesheet,
            Err(GatewayError::PriorTimesheetNotClosed { reason }) => {
                // Closed outside this client; the next action refetches.
                self.forget_timesheet(&session.id, previous_timesheet_id).await;
                return Err(ClockInError::TimesheetCloseFailed { reason });
            }
            Err(other) => {
                return Err(ClockInError::TimesheetCreationFailed {
                    reason: other.to_string(),
                })
            }
        };

        if !self.tracking.is_active(worker_id).await {
            log_warn!(
                "worker {} switched jobs without running location tracking",
                worker_id
            );
        }

        self.record_current(&session.id, timesheet.id).await;

        log_info!(
            "worker {} switched from timesheet {} to {}",
            worker_id,
            previous_timesheet_id,
            timesheet.id
        );

        if let Err(err) = self.send_approval(worker_id, manager_id, &timesheet).await {
            log_warn!("{err}");
        }

        Ok(ClockInReceipt {
            session_id: session.id,
            timesheet,
            tracking_started: false,
            closed_timesheet_id: Some(previous_timesheet_id),
        })
    }

    /// Ends the work day: closes the open timesheet, stops tracking and ends
    /// the session.
    pub async fn clock_out(
        &self,
        worker_id: Option<&WorkerId>,
    ) -> Result<ClockOutReceipt, ClockInError> {
        let worker_id = require_worker(worker_id)?;
        let _guard = self.claim(worker_id)?;

        let session = self.session_for_update(worker_id).await?;
        let timesheet_id = self.open_timesheet_id(worker_id, &session).await?;

        let coordinate = self.sample_coordinate(worker_id).await;
        let ended_at = Utc::now();

        let timesheet = match self
            .gateway
            .close_timesheet(timesheet_id, ended_at, coordinate)
            .await
        {
            Ok(timesheet) => timesheet,
            Err(err) => {
                if !matches!(err, GatewayError::Unavailable { .. }) {
                    self.forget_timesheet(&session.id, timesheet_id).await;
                }
                return Err(ClockInError::TimesheetCloseFailed {
                    reason: err.to_string(),
                });
            }
        };

        self.tracking.stop(worker_id).await;
        self.pending_starts.lock().await.remove(worker_id);

        if let Err(err) = self.gateway.end_session(&session.id, ended_at).await {
            log_warn!("gateway did not record end of session {}: {err}", session.id);
        }
        if let Err(err) = self.registry.end_session(&session.id).await {
            log_error!("failed to end session {}: {err}", session.id);
        }

        log_info!(
            "worker {} clocked out of timesheet {} (session {})",
            worker_id,
            timesheet.id,
            session.id
        );

        Ok(ClockOutReceipt {
            session_id: session.id,
            timesheet,
        })
    }

    fn claim(&self, worker_id: &WorkerId) -> Result<InFlightGuard<'_>, ClockInError> {
        let mut set = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !set.insert(worker_id.clone()) {
            return Err(ClockInError::AlreadyInProgress {
                worker_id: worker_id.clone(),
            });
        }

        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            worker_id: worker_id.clone(),
        })
    }

    /// A pending start is only resumed while its session is still active and
    /// tracking still reports under it.
    async fn resume_pending_start(&self, worker_id: &WorkerId) -> Option<Session> {
        let session_id = self.pending_starts.lock().await.get(worker_id).cloned()?;

        let session = self
            .registry
            .get_session(&session_id)
            .await
            .filter(Session::is_active);
        let tracked = self.tracking.active_session(worker_id).await.as_ref() == Some(&session_id);

        match session {
            Some(session) if tracked => {
                log_info!(
                    "retrying clock-in for worker {} on session {}",
                    worker_id,
                    session_id
                );
                Some(session)
            }
            _ => {
                self.pending_starts.lock().await.remove(worker_id);
                None
            }
        }
    }

    /// Active session for SWITCH and CLOCK-OUT. With nothing cached the
    /// gateway is asked once for an open timesheet and its session is adopted.
    async fn session_for_update(&self, worker_id: &WorkerId) -> Result<Session, ClockInError> {
        if let Some(session) = self.registry.active_session(worker_id).await {
            return Ok(session);
        }
        self.recover_session(worker_id)
            .await
            .ok_or(ClockInError::NoActiveTimesheet)
    }

    async fn recover_session(&self, worker_id: &WorkerId) -> Option<Session> {
        let timesheet = match self.gateway.find_open_timesheet(worker_id).await {
            Ok(found) => found?,
            Err(err) => {
                log_warn!("open timesheet lookup failed for worker {}: {err}", worker_id);
                return None;
            }
        };

        log_info!(
            "recovered session {} with open timesheet {} for worker {}",
            timesheet.session_id,
            timesheet.id,
            worker_id
        );
        Some(
            self.registry
                .adopt_session(Session::recovered_from(&timesheet))
                .await,
        )
    }

    /// The cached pointer may name a timesheet closed elsewhere. A gateway
    /// that no longer reports it open clears the pointer; otherwise START is
    /// refused.
    async fn confirm_still_open(
        &self,
        worker_id: &WorkerId,
        session_id: &SessionId,
        timesheet_id: TimesheetId,
    ) -> Result<(), ClockInError> {
        match self.gateway.find_open_timesheet(worker_id).await {
            Ok(Some(open)) => Err(ClockInError::TimesheetAlreadyOpen {
                timesheet_id: open.id,
            }),
            Ok(None) => {
                log_warn!(
                    "timesheet {} was closed outside this client; clearing it",
                    timesheet_id
                );
                self.forget_timesheet(session_id, timesheet_id).await;
                Ok(())
            }
            Err(err) => {
                log_warn!("open timesheet lookup failed for worker {}: {err}", worker_id);
                Err(ClockInError::TimesheetAlreadyOpen { timesheet_id })
            }
        }
    }

    async fn forget_timesheet(&self, session_id: &SessionId, timesheet_id: TimesheetId) {
        if let Err(err) = self
            .registry
            .clear_current_timesheet(session_id, timesheet_id)
            .await
        {
            log_error!("could not clear timesheet {} from session {}: {err}", timesheet_id, session_id);
        }
    }

    async fn ensure_tracking(
        &self,
        worker_id: &WorkerId,
        session_id: &SessionId,
    ) -> Result<bool, ClockInError> {
        match self.tracking.active_session(worker_id).await {
            Some(active) if active == *session_id => Ok(false),
            Some(active) if self.config.revalidate_tracking_session => {
                log_warn!(
                    "tracking for worker {} runs under stale session {}; restarting under {}",
                    worker_id,
                    active,
                    session_id
                );
                self.tracking.stop(worker_id).await;
                self.start_tracking(worker_id, session_id).await
            }
            Some(_) => Ok(false),
            None => self.start_tracking(worker_id, session_id).await,
        }
    }

    async fn start_tracking(
        &self,
        worker_id: &WorkerId,
        session_id: &SessionId,
    ) -> Result<bool, ClockInError> {
        self.tracking
            .start(worker_id, session_id)
            .await
            .map_err(|err| ClockInError::TrackingStartFailed {
                reason: err.to_string(),
            })
    }

    /// Open timesheet for the session, with one refetch from the gateway when
    /// the registry has none cached.
    async fn open_timesheet_id(
        &self,
        worker_id: &WorkerId,
        session: &Session,
    ) -> Result<TimesheetId, ClockInError> {
        if let Some(timesheet_id) = session.current_timesheet_id {
            return Ok(timesheet_id);
        }

        match self.gateway.find_open_timesheet(worker_id).await {
            Ok(Some(timesheet)) => {
                log_info!(
                    "recovered open timesheet {} for worker {} from gateway",
                    timesheet.id,
                    worker_id
                );
                self.record_current(&session.id, timesheet.id).await;
                Ok(timesheet.id)
            }
            Ok(None) => Err(ClockInError::NoActiveTimesheet),
            Err(err) => {
                log_warn!("open timesheet lookup failed for worker {}: {err}", worker_id);
                Err(ClockInError::NoActiveTimesheet)
            }
        }
    }

    async fn record_current(&self, session_id: &SessionId, timesheet_id: TimesheetId) {
        if let Err(err) = self
            .registry
            .set_current_timesheet(session_id, timesheet_id)
            .await
        {
            log_error!(
                "could not point session {} at timesheet {}: {err}",
                session_id,
                timesheet_id
            );
        }
    }

    /// Best effort; never fails the action.
    async fn sample_coordinate(&self, worker_id: &WorkerId) -> Option<Coordinate> {
        let reading = tokio::time::timeout(
            self.config.coordinate_timeout(),
            self.coordinates.last_known_coordinate(),
        )
        .await
        .ok()
        .flatten();

        if reading.is_none() {
            log_warn!("no coordinate available for worker {}", worker_id);
        }
        reading
    }

    async fn send_approval(
        &self,
        worker_id: &WorkerId,
        manager_id: Option<&str>,
        timesheet: &Timesheet,
    ) -> Result<(), NotificationFailed> {
        let notification = Notification {
            topic: self.config.approval_topic.clone(),
            recipient: manager_id.map(str::to_string),
            title: "Timesheet approval needed".into(),
            message: format!(
                "Worker {} switched to {} at jobsite {}",
                worker_id,
                timesheet.work_type.as_str(),
                timesheet.jobsite_id
            ),
            link: self.config.approval_link(timesheet.id),
            reference_id: timesheet.id.to_string(),
        };

        let failed = |reason: String| NotificationFailed {
            timesheet_id: timesheet.id,
            reason,
        };

        match tokio::time::timeout(self.config.notify_timeout(), self.gateway.notify(notification))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(failed(err.to_string())),
            Err(_) => Err(failed("timed out".into())),
        }
    }
}

fn require_worker(worker_id: Option<&WorkerId>) -> Result<&WorkerId, ClockInError> {
    worker_id
        .filter(|id| !id.is_blank())
        .ok_or(ClockInError::MissingWorkerId)
}
