#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use fieldclock::models::{
    Coordinate, LocationSample, Session, SessionId, Timesheet, TimesheetId, TimesheetPayload,
    WorkDetails, WorkVariant, WorkerId,
};
use fieldclock::{
    ClockConfig, ClockInOrchestrator, CoordinateProvider, GatewayError, LocationSink,
    Notification, TimesheetGateway, TrackingConfig,
};

/// In-memory gateway that records every call.
pub struct FakeGateway {
    pub sessions_created: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub find_calls: AtomicUsize,
    pub payloads: Mutex<Vec<TimesheetPayload>>,
    pub timesheets: Mutex<Vec<Timesheet>>,
    pub notifications: Mutex<Vec<Notification>>,
    pub ended_sessions: Mutex<Vec<SessionId>>,
    pub failing_creates: AtomicUsize,
    pub fail_notify: AtomicBool,
    pub create_delay_ms: AtomicU64,
    next_id: AtomicI64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// First timesheet id handed out.
    pub fn starting_at(first_id: i64) -> Self {
        Self {
            sessions_created: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            find_calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
            timesheets: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
            ended_sessions: Mutex::new(Vec::new()),
            failing_creates: AtomicUsize::new(0),
            fail_notify: AtomicBool::new(false),
            create_delay_ms: AtomicU64::new(0),
            next_id: AtomicI64::new(first_id),
        }
    }

    pub fn fail_next_creates(&self, count: usize) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    /// Places an open timesheet directly in the store, bypassing the client.
    pub fn seed_open_timesheet(&self, worker: &WorkerId, session: &SessionId, id: i64) {
        let payload = TimesheetPayload::fresh(
            worker.clone(),
            session.clone(),
            &WorkDetails::new("site-seed", "00.000", WorkVariant::General),
            Utc::now(),
            None,
        );
        self.timesheets
            .lock()
            .unwrap()
            .push(Timesheet::from_payload(TimesheetId(id), &payload));
    }

    pub fn open_timesheets(&self, worker: &WorkerId) -> Vec<Timesheet> {
        self.timesheets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| &t.worker_id == worker && t.is_open())
            .cloned()
            .collect()
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimesheetGateway for FakeGateway {
    async fn create_session(&self, worker_id: &WorkerId) -> Result<Session, GatewayError> {
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Session::new(
            SessionId::new(format!("session-{n}")),
            worker_id.clone(),
            Utc::now(),
        ))
    }

    async fn create_timesheet(&self, payload: TimesheetPayload) -> Result<Timesheet, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());

        let delay = self.create_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self
            .failing_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(GatewayError::Unavailable {
                reason: "503 from data service".into(),
            });
        }

        let mut store = self.timesheets.lock().unwrap();
        match &payload.closing {
            Some(closing) => {
                let previous = store
                    .iter_mut()
                    .find(|t| {
                        t.id == closing.previous_timesheet_id
                            && t.worker_id == payload.worker_id
                            && t.is_open()
                    })
                    .ok_or_else(|| GatewayError::PriorTimesheetNotClosed {
                        reason: format!("timesheet {} is not open", closing.previous_timesheet_id),
                    })?;
                previous.end_time = Some(closing.end_time);
                previous.end_coordinate = closing.end_coordinate;
            }
            None => {
                if store
                    .iter()
                    .any(|t| t.worker_id == payload.worker_id && t.is_open())
                {
                    return Err(GatewayError::Rejected {
                        reason: "worker already has an open timesheet".into(),
                    });
                }
            }
        }

        let id = TimesheetId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let timesheet = Timesheet::from_payload(id, &payload);
        store.push(timesheet.clone());
        Ok(timesheet)
    }

    async fn close_timesheet(
        &self,
        timesheet_id: TimesheetId,
        end_time: DateTime<Utc>,
        end_coordinate: Option<Coordinate>,
    ) -> Result<Timesheet, GatewayError> {
        let mut store = self.timesheets.lock().unwrap();
        let timesheet = store
            .iter_mut()
            .find(|t| t.id == timesheet_id && t.is_open())
            .ok_or_else(|| GatewayError::Rejected {
                reason: format!("timesheet {timesheet_id} is not open"),
            })?;
        timesheet.end_time = Some(end_time);
        timesheet.end_coordinate = end_coordinate;
        Ok(timesheet.clone())
    }

    async fn find_open_timesheet(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Option<Timesheet>, GatewayError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.open_timesheets(worker_id).into_iter().next())
    }

    async fn end_session(
        &self,
        session_id: &SessionId,
        _ended_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        self.ended_sessions.lock().unwrap().push(session_id.clone());
        Ok(())
    }

    async fn notify(&self, notification: Notification) -> Result<(), GatewayError> {
        if self.fail_notify.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable {
                reason: "push service down".into(),
            });
        }
        self.notifications.lock().unwrap().push(notification);
        Ok(())
    }
}

pub struct FakeSensor {
    pub permission: AtomicBool,
    pub refuse_stream: AtomicBool,
    pub acquisitions: AtomicUsize,
    pub coordinate: Mutex<Option<Coordinate>>,
}

impl FakeSensor {
    pub fn new() -> Self {
        Self {
            permission: AtomicBool::new(true),
            refuse_stream: AtomicBool::new(false),
            acquisitions: AtomicUsize::new(0),
            coordinate: Mutex::new(Some(Coordinate::new(39.7392, -104.9903))),
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoordinateProvider for FakeSensor {
    fn permission_granted(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    async fn last_known_coordinate(&self) -> Option<Coordinate> {
        *self.coordinate.lock().unwrap()
    }

    async fn acquire_stream(&self) -> Result<()> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if self.refuse_stream.load(Ordering::SeqCst) {
            return Err(anyhow!("location permission revoked"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub samples: Mutex<Vec<LocationSample>>,
}

#[async_trait]
impl LocationSink for MemorySink {
    async fn record_sample(&self, sample: LocationSample) -> Result<()> {
        self.samples.lock().unwrap().push(sample);
        Ok(())
    }
}

pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub sensor: Arc<FakeSensor>,
    pub sink: Arc<MemorySink>,
    pub orchestrator: ClockInOrchestrator,
}

pub fn test_config() -> ClockConfig {
    ClockConfig {
        tracking: TrackingConfig {
            sample_interval_secs: 1,
            sample_timeout_secs: 1,
        },
        coordinate_timeout_ms: 200,
        notify_timeout_ms: 200,
        ..ClockConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(FakeGateway::new())
}

pub fn harness_with(gateway: FakeGateway) -> Harness {
    fieldclock::init_logging();

    let gateway = Arc::new(gateway);
    let sensor = Arc::new(FakeSensor::new());
    let sink = Arc::new(MemorySink::default());
    let orchestrator = ClockInOrchestrator::assemble(
        gateway.clone(),
        sensor.clone(),
        sink.clone(),
        test_config(),
    );

    Harness {
        gateway,
        sensor,
        sink,
        orchestrator,
    }
}

pub fn general() -> WorkDetails {
    WorkDetails::new("site-1", "01.010", WorkVariant::General)
}

pub fn truck(truck_id: &str) -> WorkDetails {
    WorkDetails::new(
        "site-1",
        "03.200",
        WorkVariant::TruckDriver {
            truck_id: truck_id.into(),
            starting_mileage: Some(88_000),
        },
    )
}

pub fn tasco_e(material: &str) -> WorkDetails {
    WorkDetails::new(
        "site-2",
        "04.100",
        WorkVariant::TascoE {
            material_type: material.into(),
        },
    )
}
