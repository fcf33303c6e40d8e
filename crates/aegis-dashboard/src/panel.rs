//! Live threat monitor panel.
//!
//! Renders the poller's latest published result as a plain HTML page that
//! refreshes itself on the polling cadence.

use aegis_metrics::{DashboardState, PollError, PollUpdate};
use askama::Template;
use axum::Form;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::warn;

use crate::AppState;

fn render<T: Template>(tmpl: T) -> Html<String> {
    Html(tmpl.render().unwrap_or_else(|e| {
        format!("<pre>Template error: {e}</pre>")
    }))
}

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8">
  <meta http-equiv="refresh" content="{{ refresh_secs }}">
  <title>Aegis Live Threat Monitor</title>
</head>
<body>
  <h2>LIVE THREAT MONITOR</h2>
  <form method="post" action="/endpoint">
    <input name="endpoint" value="{{ endpoint }}" placeholder="Core B URL (http://localhost:8001)">
    <button type="submit">Apply</button>
  </form>
  {% if !notice.is_empty() %}<div class="notice">{{ notice }}</div>{% endif %}
  {% if !error.is_empty() %}<div class="error">Error: {{ error }}</div>{% endif %}
  {% if !running %}<div class="idle">Poller is stopped.</div>{% endif %}
  <section class="cards">
    <div class="card"><h3>Active Secure Sessions</h3><p>{{ active_sessions }}</p></div>
    <div class="card {% if crypto_alert %}alert{% else %}ok{% endif %}"><h3>Crypto/Auth Errors</h3><p>{{ crypto_errors }}</p></div>
    <div class="card"><h3>Deception Ratio</h3>
      <div class="bar honest" style="width: {{ honest_pct }}%">Honest {{ honest }}</div>
      <div class="bar deceptive" style="width: {{ deceptive_pct }}%">Deceptive {{ deceptive }}</div>
    </div>
  </section>
  <footer>generation {{ generation }}</footer>
</body>
</html>
"#
)]
struct MonitorTemplate {
    refresh_secs: u64,
    endpoint: String,
    running: bool,
    generation: u64,
    /// Feedback for a rejected panel action.
    notice: String,
    error: String,
    active_sessions: String,
    crypto_errors: String,
    crypto_alert: bool,
    honest: String,
    deceptive: String,
    honest_pct: String,
    deceptive_pct: String,
}

impl MonitorTemplate {
    fn build(endpoint: String, running: bool, refresh_secs: u64, latest: Option<&PollUpdate>) -> Self {
        // A failed scrape renders zeros next to the error.
        let state = latest
            .and_then(PollUpdate::state)
            .copied()
            .unwrap_or_default();
        let error = latest
            .and_then(PollUpdate::error)
            .map(|e| e.to_string())
            .unwrap_or_default();
        let (honest_pct, deceptive_pct) = percentages(&state);

        Self {
            refresh_secs,
            endpoint,
            running,
            generation: latest.map(|u| u.generation).unwrap_or(0),
            notice: String::new(),
            error,
            active_sessions: state.active_sessions.to_string(),
            crypto_errors: state.crypto_errors.to_string(),
            crypto_alert: state.crypto_errors > 0.0,
            honest: state.honest_count.to_string(),
            deceptive: state.deceptive_count.to_string(),
            honest_pct: format!("{honest_pct:.1}"),
            deceptive_pct: format!("{deceptive_pct:.1}"),
        }
    }
}

fn percentages(state: &DashboardState) -> (f64, f64) {
    if state.total_requests() > 0.0 {
        let deceptive = state.deception_ratio() * 100.0;
        (100.0 - deceptive, deceptive)
    } else {
        (0.0, 0.0)
    }
}

fn monitor_page(state: &AppState, notice: String) -> Html<String> {
    let poller = &state.poller;
    let latest = poller.latest();
    let mut tmpl = MonitorTemplate::build(
        poller.endpoint(),
        poller.is_running(),
        poller.interval().as_secs().max(1),
        latest.as_ref(),
    );
    tmpl.notice = notice;
    render(tmpl)
}

/// GET /
pub async fn monitor(State(state): State<AppState>) -> Html<String> {
    monitor_page(&state, String::new())
}

#[derive(Debug, Deserialize)]
pub struct EndpointForm {
    pub endpoint: String,
}

/// POST /endpoint
///
/// Redirects back to the panel on success. A rejected redirect re-renders
/// the panel with the reason, using the status the JSON API would return.
pub async fn redirect(
    State(state): State<AppState>,
    Form(form): Form<EndpointForm>,
) -> Response {
    let endpoint = form.endpoint.trim();
    if endpoint.is_empty() {
        let page = monitor_page(&state, "Endpoint is required.".to_string());
        return (StatusCode::BAD_REQUEST, page).into_response();
    }
    match state.poller.set_endpoint(endpoint) {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => {
            warn!(%endpoint, error = %e, "panel redirect rejected");
            let status = match e {
                PollError::NotStarted => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            };
            let page = monitor_page(&state, format!("Endpoint not applied: {e}"));
            (status, page).into_response()
        }
    }
}
