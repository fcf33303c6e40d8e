//! aegis.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::families::MetricFamilies;

/// Monitor settings, loadable from `aegis.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Core B metrics endpoint to scrape.
    pub endpoint: String,
    /// Seconds between scheduled scrapes.
    pub interval_secs: u64,
    pub families: MetricFamilies,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8001/metrics".to_string(),
            interval_secs: 5,
            families: MetricFamilies::default(),
        }
    }
}

impl MonitorConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: MonitorConfig = toml::from_str(content)?;
        if config.interval_secs == 0 {
            anyhow::bail!("interval_secs must be at least 1");
        }
        config.families.validate()?;
        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
