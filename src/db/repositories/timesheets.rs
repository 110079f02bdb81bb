use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction};

use crate::db::{
    helpers::{row_to_timesheet, TIMESHEET_COLUMNS},
    Database,
};
use crate::error::GatewayError;
use crate::models::{Coordinate, Timesheet, TimesheetId, TimesheetPayload, WorkerId};

fn load_timesheet(tx: &Transaction<'_>, id: i64) -> Result<Option<Timesheet>> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {TIMESHEET_COLUMNS} FROM timesheets WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![id])?;
    let found = match rows.next()? {
        Some(row) => Some(row_to_timesheet(row)?),
        None => None,
    };
    Ok(found)
}

impl Database {
    /// Inserts a timesheet. With `payload.closing` the previous timesheet is
    /// closed in the same transaction; without it the worker must have no
    /// open timesheet. Domain rejections surface as [`GatewayError`] inside
    /// the returned `anyhow::Error`.
    pub async fn insert_timesheet(&self, payload: &TimesheetPayload) -> Result<Timesheet> {
        let payload = payload.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let session_open: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM sessions WHERE id = ?1 AND worker_id = ?2 AND ended_at IS NULL",
                    params![payload.session_id.as_str(), payload.worker_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if session_open.is_none() {
                return Err(GatewayError::Rejected {
                    reason: format!(
                        "session {} is not active for worker {}",
                        payload.session_id, payload.worker_id
                    ),
                }
                .into());
            }

            match &payload.closing {
                Some(closing) => {
                    let closed = tx
                        .execute(
                            "UPDATE timesheets
                             SET end_time = ?1, end_lat = ?2, end_lng = ?3
                             WHERE id = ?4 AND worker_id = ?5 AND end_time IS NULL",
                            params![
                                closing.end_time.to_rfc3339(),
                                closing.end_coordinate.map(|c| c.lat),
                                closing.end_coordinate.map(|c| c.lng),
                                closing.previous_timesheet_id.get(),
                                payload.worker_id.as_str(),
                            ],
                        )
                        .with_context(|| "failed to close previous timesheet")?;
                    if closed == 0 {
                        return Err(GatewayError::PriorTimesheetNotClosed {
                            reason: format!(
                                "timesheet {} is not open for worker {}",
                                closing.previous_timesheet_id, payload.worker_id
                            ),
                        }
                        .into());
                    }
                }
                None => {
                    let open: Option<i64> = tx
                        .query_row(
                            "SELECT id FROM timesheets WHERE worker_id = ?1 AND end_time IS NULL",
                            params![payload.worker_id.as_str()],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if let Some(open) = open {
                        return Err(GatewayError::Rejected {
                            reason: format!(
                                "worker {} already has open timesheet {open}",
                                payload.worker_id
                            ),
                        }
                        .into());
                    }
                }
            }

            tx.execute(
                "INSERT INTO timesheets (
                    worker_id, session_id, work_type, jobsite_id, cost_code, start_time,
                    start_lat, start_lng, shift_type, labor_type, material_type,
                    truck_id, equipment_id, starting_mileage
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    payload.worker_id.as_str(),
                    payload.session_id.as_str(),
                    payload.work_type.as_str(),
                    payload.jobsite_id,
                    payload.cost_code,
                    payload.start_time.to_rfc3339(),
                    payload.start_coordinate.map(|c| c.lat),
                    payload.start_coordinate.map(|c| c.lng),
                    payload.fields.shift_type,
                    payload.fields.labor_type,
                    payload.fields.material_type,
                    payload.fields.truck_id,
                    payload.fields.equipment_id,
                    payload.fields.starting_mileage,
                ],
            )
            .with_context(|| "failed to insert timesheet")?;

            let id = tx.last_insert_rowid();
            tx.commit().context("failed to commit timesheet")?;
            Ok(Timesheet::from_payload(TimesheetId(id), &payload))
        })
        .await
    }

    pub async fn finish_timesheet(
        &self,
        timesheet_id: TimesheetId,
        end_time: DateTime<Utc>,
        end_coordinate: Option<Coordinate>,
    ) -> Result<Timesheet> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let closed = tx
                .execute(
                    "UPDATE timesheets
                     SET end_time = ?1, end_lat = ?2, end_lng = ?3
                     WHERE id = ?4 AND end_time IS NULL",
                    params![
                        end_time.to_rfc3339(),
                        end_coordinate.map(|c| c.lat),
                        end_coordinate.map(|c| c.lng),
                        timesheet_id.get(),
                    ],
                )
                .with_context(|| "failed to close timesheet")?;
            if closed == 0 {
                return Err(GatewayError::Rejected {
                    reason: format!("timesheet {timesheet_id} is not open"),
                }
                .into());
            }

            let timesheet = load_timesheet(&tx, timesheet_id.get())?
                .with_context(|| format!("timesheet {timesheet_id} vanished after close"))?;
            tx.commit().context("failed to commit timesheet close")?;
            Ok(timesheet)
        })
        .await
    }

    pub async fn get_timesheet(&self, timesheet_id: TimesheetId) -> Result<Option<Timesheet>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TIMESHEET_COLUMNS} FROM timesheets WHERE id = ?1"
            ))?;
            let mut rows = stmt.query(params![timesheet_id.get()])?;
            let found = match rows.next()? {
                Some(row) => Some(row_to_timesheet(row)?),
                None => None,
            };
            Ok(found)
        })
        .await
    }

    pub async fn get_open_timesheets(&self, worker_id: &WorkerId) -> Result<Vec<Timesheet>> {
        let worker_id = worker_id.clone();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TIMESHEET_COLUMNS} FROM timesheets
                 WHERE worker_id = ?1 AND end_time IS NULL
                 ORDER BY start_time DESC"
            ))?;
            let mut rows = stmt.query(params![worker_id.as_str()])?;
            let mut timesheets = Vec::new();
            while let Some(row) = rows.next()? {
                timesheets.push(row_to_timesheet(row)?);
            }
            Ok(timesheets)
        })
        .await
    }

    pub async fn list_timesheets_for_worker(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Vec<Timesheet>> {
        let worker_id = worker_id.clone();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TIMESHEET_COLUMNS} FROM timesheets
                 WHERE worker_id = ?1
                 ORDER BY id ASC"
            ))?;
            let mut rows = stmt.query(params![worker_id.as_str()])?;
            let mut timesheets = Vec::new();
            while let Some(row) = rows.next()? {
                timesheets.push(row_to_timesheet(row)?);
            }
            Ok(timesheets)
        })
        .await
    }
}
