use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::{params, Row};

use crate::db::{
    helpers::{parse_datetime, parse_optional_datetime},
    Database,
};
use crate::models::{Session, SessionId, TimesheetId, WorkerId};

fn row_to_session(row: &Row) -> Result<Session> {
    let created_at: String = row.get("created_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let current: Option<i64> = row.get("current_timesheet_id")?;

    Ok(Session {
        id: SessionId::new(row.get::<_, String>("id")?),
        worker_id: WorkerId::new(row.get::<_, String>("worker_id")?),
        created_at: parse_datetime(&created_at, "created_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        current_timesheet_id: current.map(TimesheetId),
    })
}

const SESSION_SELECT: &str = "SELECT s.id, s.worker_id, s.created_at, s.ended_at,
        (SELECT t.id FROM timesheets t
          WHERE t.session_id = s.id AND t.end_time IS NULL
          LIMIT 1) AS current_timesheet_id
     FROM sessions s";

impl Database {
    /// Inserts a new active session, ending any session the worker left open
    /// (for example after a crash).
    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let abandoned = tx
                .execute(
                    "UPDATE sessions SET ended_at = ?1
                     WHERE worker_id = ?2 AND ended_at IS NULL",
                    params![record.created_at.to_rfc3339(), record.worker_id.as_str()],
                )
                .with_context(|| "failed to end abandoned sessions")?;
            if abandoned > 0 {
                warn!(
                    "Ended {} abandoned session(s) for worker {}",
                    abandoned, record.worker_id
                );
            }

            tx.execute(
                "INSERT INTO sessions (id, worker_id, created_at, ended_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.as_str(),
                    record.worker_id.as_str(),
                    record.created_at.to_rfc3339(),
                    record.ended_at.map(|dt| dt.to_rfc3339()),
                ],
            )
            .with_context(|| "failed to insert session")?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn mark_session_ended(
        &self,
        session_id: &SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.clone();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions SET ended_at = ?1
                 WHERE id = ?2 AND ended_at IS NULL",
                params![ended_at.to_rfc3339(), session_id.as_str()],
            )
            .with_context(|| "failed to end session")?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>> {
        let session_id = session_id.clone();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!("{SESSION_SELECT} WHERE s.id = ?1"))?;
            let mut rows = stmt.query(params![session_id.as_str()])?;
            let found = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(found)
        })
        .await
    }

    pub async fn get_active_session(&self, worker_id: &WorkerId) -> Result<Option<Session>> {
        let worker_id = worker_id.clone();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SESSION_SELECT} WHERE s.worker_id = ?1 AND s.ended_at IS NULL"
            ))?;
            let mut rows = stmt.query(params![worker_id.as_str()])?;
            let found = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(found)
        })
        .await
    }
}
