use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::TrackingConfig;
use crate::models::{LocationSample, SessionId, WorkerId};

use super::provider::{CoordinateProvider, LocationSink};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub async fn tracking_loop(
    worker_id: WorkerId,
    session_id: SessionId,
    provider: Arc<dyn CoordinateProvider>,
    sink: Arc<dyn LocationSink>,
    config: TrackingConfig,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.sample_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let sample_timeout = config.sample_timeout();

    log_info!("tracking loop started for worker {} session {}", worker_id, session_id);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let fut = sample_once(&worker_id, &session_id, provider.as_ref(), sink.as_ref());

                match tokio::time::timeout(sample_timeout, fut).await {
                    Ok(Ok(())) => {},
                    Ok(Err(err)) => log_error!("location sample failed for worker {}: {err:?}", worker_id),
                    Err(_) => log_warn!(
                        "location sample timeout (> {}s) for worker {}",
                        sample_timeout.as_secs(),
                        worker_id
                    ),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("tracking loop shutting down for worker {}", worker_id);
                break;
            }
        }
    }
}

async fn sample_once(
    worker_id: &WorkerId,
    session_id: &SessionId,
    provider: &dyn CoordinateProvider,
    sink: &dyn LocationSink,
) -> Result<()> {
    let Some(coordinate) = provider.last_known_coordinate().await else {
        return Ok(());
    };

    let sample = LocationSample {
        worker_id: worker_id.clone(),
        session_id: session_id.clone(),
        coordinate,
        recorded_at: Utc::now(),
    };

    sink.record_sample(sample)
        .await
        .context("failed to persist location sample")
}
