use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::params;

use crate::db::Database;
use crate::gateway::Notification;

impl Database {
    /// Queues a notification in the local outbox.
    pub async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let record = notification.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO notifications (topic, recipient, title, message, link, reference_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.topic,
                    record.recipient,
                    record.title,
                    record.message,
                    record.link,
                    record.reference_id,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| "failed to queue notification")?;
            Ok(())
        })
        .await
    }

    pub async fn list_notifications(&self) -> Result<Vec<Notification>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT topic, recipient, title, message, link, reference_id
                 FROM notifications
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut notifications = Vec::new();
            while let Some(row) = rows.next()? {
                notifications.push(Notification {
                    topic: row.get(0)?,
                    recipient: row.get(1)?,
                    title: row.get(2)?,
                    message: row.get(3)?,
                    link: row.get(4)?,
                    reference_id: row.get(5)?,
                });
            }
            Ok(notifications)
        })
        .await
    }
}
