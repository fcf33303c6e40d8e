//! aegis-dashboard — operator UI and REST API for Aegis.
//!
//! Serves the live threat monitor panel backed by an
//! [`aegis_metrics::Poller`], a small JSON API to observe and redirect
//! that poller, a scrape proxy, and the deployment bundle generator.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Monitor panel (HTML) |
//! | POST | `/endpoint` | Panel form: redirect the poller |
//! | GET | `/api/state` | Latest published scrape |
//! | POST | `/api/endpoint` | Redirect the poller |
//! | POST | `/api/refresh` | Scrape now |
//! | GET | `/api/metrics?target=` | Raw exposition proxy |
//! | POST | `/api/generate-config` | Deployment bundle (zip) |

pub mod bundle;
pub mod handlers;
pub mod panel;

use std::sync::Arc;

use aegis_metrics::{Fetcher, Poller};
use axum::Router;
use axum::routing::{get, post};

/// Shared state for dashboard handlers.
#[derive(Clone)]
pub struct AppState {
    pub poller: Poller,
    /// Used by the scrape proxy, independent of the poller's target.
    pub fetcher: Arc<dyn Fetcher>,
}

/// Build the complete router (panel + API).
pub fn build_router(poller: Poller, fetcher: Arc<dyn Fetcher>) -> Router {
    let state = AppState { poller, fetcher };

    let api_routes = Router::new()
        .route("/state", get(handlers::get_state))
        .route("/endpoint", post(handlers::set_endpoint))
        .route("/refresh", post(handlers::refresh))
        .route("/metrics", get(handlers::proxy_metrics))
        .route("/generate-config", post(handlers::generate_config));

    Router::new()
        .route("/", get(panel::monitor))
        .route("/endpoint", post(panel::redirect))
        .nest("/api", api_routes)
        .with_state(state)
}
