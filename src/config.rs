use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEBUG_ENV: &str = "FIELDCLOCK_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackingConfig {
    pub sample_interval_secs: u64,
    pub sample_timeout_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 30,
            sample_timeout_secs: 10,
        }
    }
}

impl TrackingConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs.max(1))
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_secs(self.sample_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClockConfig {
    pub tracking: TrackingConfig,
    /// Upper bound on a best-effort coordinate read during clock-in.
    pub coordinate_timeout_ms: u64,
    pub notify_timeout_ms: u64,
    pub approval_topic: String,
    pub approval_link_base: String,
    /// Restart tracking when it is running under a different session than the
    /// one just resolved.
    pub revalidate_tracking_session: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            coordinate_timeout_ms: 2_000,
            notify_timeout_ms: 5_000,
            approval_topic: "timecard-approval".into(),
            approval_link_base: "/dashboard/timesheets".into(),
            revalidate_tracking_session: true,
        }
    }
}

impl ClockConfig {
    /// Applies `FIELDCLOCK_DEBUG`, which samples every second.
    pub fn with_env_overrides(mut self) -> Self {
        let debug_mode = std::env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if debug_mode {
            self.tracking.sample_interval_secs = 1;
        }
        self
    }

    pub fn coordinate_timeout(&self) -> Duration {
        Duration::from_millis(self.coordinate_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn approval_link(&self, timesheet_id: impl std::fmt::Display) -> String {
        format!(
            "{}/{}",
            self.approval_link_base.trim_end_matches('/'),
            timesheet_id
        )
    }
}

/// JSON-backed configuration file.
pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<ClockConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config at {}", path.display()))?
        } else {
            ClockConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> ClockConfig {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, config: ClockConfig) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&config)?;
        *guard = config;
        Ok(())
    }

    fn persist(&self, data: &ClockConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write config to {}", self.path.display()))
    }
}
