//! aegis-metrics — live metrics ingestion for the Aegis dashboard.
//!
//! Scrapes a Prometheus-style text exposition from a Core B endpoint,
//! extracts the handful of families the dashboard surfaces, and
//! publishes a derived [`DashboardState`] on a fixed polling cadence.
//!
//! # Architecture
//!
//! ```text
//! Poller
//!   ├── Recurring tick (tokio interval) + out-of-band fetches
//!   │   ├── Fetcher::fetch(endpoint) → exposition text
//!   │   ├── parse() → Vec<Sample>
//!   │   └── aggregate() → DashboardState
//!   └── watch channel ← latest non-superseded PollUpdate
//! ```
//!
//! # Supersession
//!
//! Every issued fetch is tagged with a fresh generation. A completed fetch
//! publishes only if its generation is still the current one, so a slow
//! response for an old endpoint can never overwrite a newer result.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod families;
pub mod fetch;
pub mod parser;
pub mod poller;
pub mod types;

pub use aggregate::aggregate;
pub use config::MonitorConfig;
pub use error::{FetchError, PollError, PollResult};
pub use families::MetricFamilies;
pub use fetch::{BoxFuture, Fetcher, HttpFetcher};
pub use parser::parse;
pub use poller::{DEFAULT_INTERVAL, PollUpdate, Poller};
pub use types::{DashboardState, Sample};
