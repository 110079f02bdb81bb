use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::error::TrackingError;
use crate::models::{SessionId, WorkerId};

use super::loop_worker::tracking_loop;
use super::provider::{CoordinateProvider, LocationSink};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Live background sampling for one worker.
pub struct TrackingHandle {
    pub worker_id: WorkerId,
    pub session_id: SessionId,
    /// Distinguishes one running stream from a later restart.
    pub instance: Uuid,
    pub started_at: DateTime<Utc>,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TrackingHandle {
    fn is_running(&self) -> bool {
        !self.cancel_token.is_cancelled() && !self.handle.is_finished()
    }
}

pub struct LocationTrackingController {
    provider: Arc<dyn CoordinateProvider>,
    sink: Arc<dyn LocationSink>,
    config: TrackingConfig,
    handles: Mutex<HashMap<WorkerId, TrackingHandle>>,
}

impl LocationTrackingController {
    pub fn new(
        provider: Arc<dyn CoordinateProvider>,
        sink: Arc<dyn LocationSink>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            provider,
            sink,
            config,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub async fn is_active(&self, worker_id: &WorkerId) -> bool {
        self.handles
            .lock()
            .await
            .get(worker_id)
            .map(TrackingHandle::is_running)
            .unwrap_or(false)
    }

    /// Session the running stream reports under, if any.
    pub async fn active_session(&self, worker_id: &WorkerId) -> Option<SessionId> {
        self.handles
            .lock()
            .await
            .get(worker_id)
            .filter(|handle| handle.is_running())
            .map(|handle| handle.session_id.clone())
    }

    pub async fn handle_instance(&self, worker_id: &WorkerId) -> Option<Uuid> {
        self.handles
            .lock()
            .await
            .get(worker_id)
            .filter(|handle| handle.is_running())
            .map(|handle| handle.instance)
    }

    /// Starts sampling for `worker_id`. Returns `Ok(false)` when a stream is
    /// already running; the running stream is left untouched.
    pub async fn start(
        &self,
        worker_id: &WorkerId,
        session_id: &SessionId,
    ) -> Result<bool, TrackingError> {
        let mut handles = self.handles.lock().await;

        if let Some(existing) = handles.get(worker_id) {
            if existing.is_running() {
                log_warn!(
                    "tracking already active for worker {} (session {}); not restarting",
                    worker_id,
                    existing.session_id
                );
                return Ok(false);
            }
            handles.remove(worker_id);
        }

        self.provider
            .acquire_stream()
            .await
            .map_err(|err| TrackingError::StartFailed {
                reason: format!("{err:#}"),
            })?;

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tracking_loop(
            worker_id.clone(),
            session_id.clone(),
            self.provider.clone(),
            self.sink.clone(),
            self.config.clone(),
            cancel_token.clone(),
        ));

        let instance = Uuid::new_v4();
        handles.insert(
            worker_id.clone(),
            TrackingHandle {
                worker_id: worker_id.clone(),
                session_id: session_id.clone(),
                instance,
                started_at: Utc::now(),
                cancel_token,
                handle,
            },
        );

        log_info!(
            "tracking started for worker {} session {} ({})",
            worker_id,
            session_id,
            instance
        );
        Ok(true)
    }

    /// Stops sampling for `worker_id`; no-op when nothing is running.
    pub async fn stop(&self, worker_id: &WorkerId) {
        let Some(tracking) = self.handles.lock().await.remove(worker_id) else {
            return;
        };

        tracking.cancel_token.cancel();
        if let Err(err) = tracking.handle.await {
            log_error!("tracking loop for worker {} failed to join: {err}", worker_id);
        }
    }

    pub async fn stop_all(&self) {
        let drained: Vec<TrackingHandle> = {
            let mut handles = self.handles.lock().await;
            handles.drain().map(|(_, handle)| handle).collect()
        };

        for tracking in drained {
            tracking.cancel_token.cancel();
            if let Err(err) = tracking.handle.await {
                log_error!(
                    "tracking loop for worker {} failed to join: {err}",
                    tracking.worker_id
                );
            }
        }
    }
}
