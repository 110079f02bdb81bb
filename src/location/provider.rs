use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Coordinate, LocationSample};

/// Device location sensor.
#[async_trait]
pub trait CoordinateProvider: Send + Sync {
    fn permission_granted(&self) -> bool;

    /// Last known fix. Must not wait for a fresh reading.
    async fn last_known_coordinate(&self) -> Option<Coordinate>;

    /// Acquires the underlying sampling stream before a tracking loop starts.
    async fn acquire_stream(&self) -> Result<()>;
}

/// Destination for samples produced by the tracking loop.
#[async_trait]
pub trait LocationSink: Send + Sync {
    async fn record_sample(&self, sample: LocationSample) -> Result<()>;
}
