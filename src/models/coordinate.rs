use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SessionId, WorkerId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A single reading reported by the tracking loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub worker_id: WorkerId,
    pub session_id: SessionId,
    pub coordinate: Coordinate,
    pub recorded_at: DateTime<Utc>,
}
