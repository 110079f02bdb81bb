use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use chrono::Utc;
use log::info;
use tokio::sync::Mutex;

use crate::error::{GatewayError, RegistryError};
use crate::gateway::TimesheetGateway;
use crate::models::{Session, SessionId, TimesheetId, WorkerId};

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, Session>,
    active: HashMap<WorkerId, SessionId>,
}

impl RegistryState {
    fn active_for(&self, worker_id: &WorkerId) -> Option<&Session> {
        self.active
            .get(worker_id)
            .and_then(|id| self.sessions.get(id))
            .filter(|session| session.is_active())
    }
}

/// Process-wide map from worker to their active session. Reads hand out
/// snapshots; callers never hold a reference into the registry.
pub struct SessionRegistry {
    gateway: Arc<dyn TimesheetGateway>,
    state: Mutex<RegistryState>,
    resolves: AtomicUsize,
}

impl SessionRegistry {
    pub fn new(gateway: Arc<dyn TimesheetGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(RegistryState::default()),
            resolves: AtomicUsize::new(0),
        }
    }

    /// Returns the worker's active session, creating one through the gateway
    /// when there is none. The lock is held across the gateway call so two
    /// callers for the same worker cannot both create a session.
    pub async fn resolve_or_create_session(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Session, GatewayError> {
        self.resolves.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().await;

        if let Some(session) = state.active_for(worker_id) {
            return Ok(session.clone());
        }

        let session = self.gateway.create_session(worker_id).await?;
        info!("created session {} for worker {}", session.id, worker_id);

        state.active.insert(worker_id.clone(), session.id.clone());
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    /// How many times `resolve_or_create_session` has been called, cached
    /// hits included.
    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::Relaxed)
    }

    /// Registers a session this process did not create, for example one
    /// recovered from the gateway after a restart. An active adopted session
    /// becomes the worker's active session.
    pub async fn adopt_session(&self, session: Session) -> Session {
        let mut state = self.state.lock().await;
        if session.is_active() {
            state
                .active
                .insert(session.worker_id.clone(), session.id.clone());
        }
        state.sessions.insert(session.id.clone(), session.clone());
        info!("adopted session {} for worker {}", session.id, session.worker_id);
        session
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Option<Session> {
        self.state.lock().await.sessions.get(session_id).cloned()
    }

    pub async fn active_session(&self, worker_id: &WorkerId) -> Option<Session> {
        self.state.lock().await.active_for(worker_id).cloned()
    }

    pub async fn set_current_timesheet(
        &self,
        session_id: &SessionId,
        timesheet_id: TimesheetId,
    ) -> Result<Session, RegistryError> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.clone()))?;

        if !session.is_active() {
            return Err(RegistryError::SessionEnded(session_id.clone()));
        }

        session.current_timesheet_id = Some(timesheet_id);
        Ok(session.clone())
    }

    /// Drops the current-timesheet pointer if it still names `timesheet_id`.
    pub async fn clear_current_timesheet(
        &self,
        session_id: &SessionId,
        timesheet_id: TimesheetId,
    ) -> Result<Session, RegistryError> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.clone()))?;

        if session.current_timesheet_id == Some(timesheet_id) {
            session.current_timesheet_id = None;
        }
        Ok(session.clone())
    }

    /// Ends a session. Ending an ended session returns it unchanged.
    pub async fn end_session(&self, session_id: &SessionId) -> Result<Session, RegistryError> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.clone()))?;

        if session.ended_at.is_none() {
            session.ended_at = Some(Utc::now());
            info!("ended session {} for worker {}", session.id, session.worker_id);
        }
        let snapshot = session.clone();

        if state.active.get(&snapshot.worker_id) == Some(session_id) {
            state.active.remove(&snapshot.worker_id);
        }
        Ok(snapshot)
    }
}
