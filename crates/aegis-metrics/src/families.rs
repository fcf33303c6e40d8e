//! Recognized metric families and status markers.
//!
//! Family names are configuration, not protocol: the parser and the
//! aggregator only ever see them through a [`MetricFamilies`] value.

use serde::{Deserialize, Serialize};

/// The metric families the dashboard extracts from a scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricFamilies {
    /// Request counter, disaggregated by the status label.
    pub requests: String,
    /// Active session gauge.
    pub active_sessions: String,
    /// Crypto/auth error gauge.
    pub crypto_errors: String,
    /// Label key carrying the request outcome.
    pub status_label: String,
    /// Status value for successful, non-deceptive responses.
    pub honest_status: String,
    /// Status value for successful, deceptive responses.
    pub deceptive_status: String,
}

impl Default for MetricFamilies {
    fn default() -> Self {
        Self {
            requests: "aegis_requests_total".to_string(),
            active_sessions: "aegis_active_sessions".to_string(),
            crypto_errors: "aegis_crypto_errors".to_string(),
            status_label: "status".to_string(),
            honest_status: "success_honest".to_string(),
            deceptive_status: "success_deceptive".to_string(),
        }
    }
}

impl MetricFamilies {
    /// Name prefixes the parser accepts as candidate sample lines.
    pub fn prefixes(&self) -> [&str; 3] {
        [&self.requests, &self.active_sessions, &self.crypto_errors]
    }

    /// Reject blank names. An empty prefix would match every line.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (field, value) in [
            ("requests", &self.requests),
            ("active_sessions", &self.active_sessions),
            ("crypto_errors", &self.crypto_errors),
            ("status_label", &self.status_label),
            ("honest_status", &self.honest_status),
            ("deceptive_status", &self.deceptive_status),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("families.{field} must not be empty");
            }
        }
        Ok(())
    }
}
