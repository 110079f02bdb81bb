use anyhow::{Context, Result};
use rusqlite::params;

use crate::db::{helpers::parse_datetime, Database};
use crate::models::{Coordinate, LocationSample, SessionId, WorkerId};

impl Database {
    pub async fn insert_location_sample(&self, sample: &LocationSample) -> Result<()> {
        let record = sample.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO location_samples (worker_id, session_id, lat, lng, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.worker_id.as_str(),
                    record.session_id.as_str(),
                    record.coordinate.lat,
                    record.coordinate.lng,
                    record.recorded_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert location sample")?;
            Ok(())
        })
        .await
    }

    pub async fn get_location_samples_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<LocationSample>> {
        let session_id = session_id.clone();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT worker_id, session_id, lat, lng, recorded_at
                 FROM location_samples
                 WHERE session_id = ?1
                 ORDER BY recorded_at ASC, id ASC",
            )?;

            let mut rows = stmt.query(params![session_id.as_str()])?;
            let mut samples = Vec::new();
            while let Some(row) = rows.next()? {
                let recorded_at: String = row.get(4)?;
                samples.push(LocationSample {
                    worker_id: WorkerId::new(row.get::<_, String>(0)?),
                    session_id: SessionId::new(row.get::<_, String>(1)?),
                    coordinate: Coordinate::new(row.get(2)?, row.get(3)?),
                    recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
                });
            }
            Ok(samples)
        })
        .await
    }
}
