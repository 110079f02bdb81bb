use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::models::{
    Coordinate, SessionId, Timesheet, TimesheetId, VariantFields, WorkType, WorkerId,
};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_work_type(value: &str) -> Result<WorkType> {
    WorkType::parse(value).ok_or_else(|| anyhow!("unknown work type {value}"))
}

pub fn to_u32(value: Option<i64>, field: &str) -> Result<Option<u32>> {
    value
        .map(|raw| u32::try_from(raw).map_err(|_| anyhow!("{field} out of range: {raw}")))
        .transpose()
}

/// Both halves present or the coordinate is absent.
pub fn coordinate_from(lat: Option<f64>, lng: Option<f64>) -> Option<Coordinate> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
        _ => None,
    }
}

pub const TIMESHEET_COLUMNS: &str = "id, worker_id, session_id, work_type, jobsite_id, cost_code,
    start_time, end_time, start_lat, start_lng, end_lat, end_lng,
    shift_type, labor_type, material_type, truck_id, equipment_id, starting_mileage";

pub fn row_to_timesheet(row: &Row) -> Result<Timesheet> {
    let start_time: String = row.get("start_time")?;
    let end_time: Option<String> = row.get("end_time")?;
    let work_type: String = row.get("work_type")?;

    Ok(Timesheet {
        id: TimesheetId(row.get("id")?),
        worker_id: WorkerId::new(row.get::<_, String>("worker_id")?),
        session_id: SessionId::new(row.get::<_, String>("session_id")?),
        work_type: parse_work_type(&work_type)?,
        jobsite_id: row.get("jobsite_id")?,
        cost_code: row.get("cost_code")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_optional_datetime(end_time, "end_time")?,
        start_coordinate: coordinate_from(row.get("start_lat")?, row.get("start_lng")?),
        end_coordinate: coordinate_from(row.get("end_lat")?, row.get("end_lng")?),
        fields: VariantFields {
            shift_type: row.get("shift_type")?,
            labor_type: row.get("labor_type")?,
            material_type: row.get("material_type")?,
            truck_id: row.get("truck_id")?,
            equipment_id: row.get("equipment_id")?,
            starting_mileage: to_u32(row.get("starting_mileage")?, "starting_mileage")?,
        },
    })
}
