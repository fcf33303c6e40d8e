//! Domain types produced by the ingestion pipeline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One parsed observation from an exposition payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Metric family identifier (the token before `{` or the first space).
    pub name: String,
    /// Label key → value. Empty when the line carried no label block.
    pub labels: HashMap<String, String>,
    pub value: f64,
}

impl Sample {
    /// Create a sample with no labels.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            labels: HashMap::new(),
            value,
        }
    }

    /// Builder-style label insertion (mostly for tests and fixtures).
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Look up a label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Derived snapshot rendered by the monitor panel.
///
/// Every field defaults to zero when the payload carried no matching sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    /// Sum of request samples with the honest success status.
    pub honest_count: f64,
    /// Sum of request samples with the deceptive success status.
    pub deceptive_count: f64,
    /// Last active-sessions gauge value seen.
    pub active_sessions: f64,
    /// Last crypto-errors gauge value seen.
    pub crypto_errors: f64,
}

impl DashboardState {
    /// Honest plus deceptive requests.
    pub fn total_requests(&self) -> f64 {
        self.honest_count + self.deceptive_count
    }

    /// Share of successful requests answered deceptively (0.0-1.0).
    pub fn deception_ratio(&self) -> f64 {
        let total = self.total_requests();
        if total > 0.0 {
            self.deceptive_count / total
        } else {
            0.0
        }
    }
}
