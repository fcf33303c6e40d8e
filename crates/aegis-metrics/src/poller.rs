//! Poll scheduler — drives fetch → parse → aggregate → publish.
//!
//! A [`Poller`] owns the current scrape target and a recurring timer.
//! Each issued fetch (timer tick, redirect, or manual refresh) takes a new
//! generation; on completion it publishes only if that generation is still
//! current. The generation check and the publication happen under the same
//! lock that bumps the generation, so results are never reordered.
//!
//! Observers read results from a `watch` channel holding the latest
//! [`PollUpdate`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::error::{FetchError, PollError, PollResult};
use crate::families::MetricFamilies;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::parser::parse;
use crate::types::DashboardState;

/// Dashboard polling cadence.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// A published scrape result.
#[derive(Debug, Clone, PartialEq)]
pub struct PollUpdate {
    /// Generation the fetch was issued under.
    pub generation: u64,
    /// Endpoint that was scraped.
    pub endpoint: String,
    pub outcome: Result<DashboardState, FetchError>,
}

impl PollUpdate {
    /// The derived state, if the scrape succeeded.
    pub fn state(&self) -> Option<&DashboardState> {
        self.outcome.as_ref().ok()
    }

    /// The failure, if the scrape failed.
    pub fn error(&self) -> Option<&FetchError> {
        self.outcome.as_ref().err()
    }
}

/// Mutable engine state. Only touched under `Shared::engine`.
struct Engine {
    endpoint: String,
    generation: u64,
    interval: Duration,
    /// Recurring tick task; `Some` while polling.
    timer: Option<JoinHandle<()>>,
    /// The newest issued fetch. Older ones are aborted when superseded.
    in_flight: Option<AbortHandle>,
}

struct Shared {
    fetcher: Arc<dyn Fetcher>,
    families: MetricFamilies,
    engine: Mutex<Engine>,
    updates: watch::Sender<Option<PollUpdate>>,
}

impl Shared {
    fn engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `update` unless a newer fetch has been issued since.
    fn publish(&self, update: PollUpdate) -> bool {
        let engine = self.engine();
        if engine.generation != update.generation {
            debug!(
                generation = update.generation,
                current = engine.generation,
                endpoint = %update.endpoint,
                "discarding superseded scrape"
            );
            return false;
        }
        self.updates.send_replace(Some(update));
        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let engine = self.engine.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = engine.timer.take() {
            timer.abort();
        }
    }
}

/// Live metrics poller. Cheap to clone; clones share one engine.
#[derive(Clone)]
pub struct Poller {
    shared: Arc<Shared>,
}

impl Poller {
    /// Create an idle poller.
    pub fn new(fetcher: Arc<dyn Fetcher>, families: MetricFamilies) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                fetcher,
                families,
                engine: Mutex::new(Engine {
                    endpoint: String::new(),
                    generation: 0,
                    interval: DEFAULT_INTERVAL,
                    timer: None,
                    in_flight: None,
                }),
                updates,
            }),
        }
    }

    /// Create an idle poller that scrapes over HTTP.
    pub fn http(families: MetricFamilies) -> Self {
        Self::new(Arc::new(HttpFetcher::new()), families)
    }

    /// Begin polling `endpoint`: one fetch now, then one every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, endpoint: impl Into<String>, interval: Duration) -> PollResult<()> {
        if interval.is_zero() {
            return Err(PollError::InvalidInterval);
        }

        let mut engine = self.shared.engine();
        if engine.timer.is_some() {
            return Err(PollError::AlreadyStarted);
        }

        engine.endpoint = endpoint.into();
        engine.interval = interval;
        // Results from a previous session describe another target.
        self.shared.updates.send_if_modified(|latest| latest.take().is_some());
        engine.timer = Some(tokio::spawn(run_timer(
            Arc::downgrade(&self.shared),
            interval,
        )));

        info!(endpoint = %engine.endpoint, ?interval, "metrics poller started");
        issue(&self.shared, &mut engine);
        Ok(())
    }

    /// Redirect polling to `endpoint` and fetch it immediately.
    ///
    /// The recurring timer keeps its cadence. Returns the generation of the
    /// immediate fetch.
    pub fn set_endpoint(&self, endpoint: impl Into<String>) -> PollResult<u64> {
        let mut engine = self.shared.engine();
        if engine.timer.is_none() {
            return Err(PollError::NotStarted);
        }

        let endpoint = endpoint.into();
        info!(from = %engine.endpoint, to = %endpoint, "metrics endpoint changed");
        engine.endpoint = endpoint;
        Ok(issue(&self.shared, &mut engine))
    }

    /// Fetch the current endpoint now, outside the timer cadence.
    pub fn refresh(&self) -> PollResult<u64> {
        let mut engine = self.shared.engine();
        if engine.timer.is_none() {
            return Err(PollError::NotStarted);
        }
        Ok(issue(&self.shared, &mut engine))
    }

    /// Stop polling. Idempotent and non-blocking.
    ///
    /// The in-flight fetch is aborted and, should it still complete, its
    /// result is discarded.
    pub fn stop(&self) {
        let mut engine = self.shared.engine();
        let Some(timer) = engine.timer.take() else {
            return;
        };
        timer.abort();
        if let Some(handle) = engine.in_flight.take() {
            handle.abort();
        }
        engine.generation += 1;
        info!(endpoint = %engine.endpoint, "metrics poller stopped");
    }

    /// Subscribe to published results.
    pub fn subscribe(&self) -> watch::Receiver<Option<PollUpdate>> {
        self.shared.updates.subscribe()
    }

    /// The most recently published result.
    pub fn latest(&self) -> Option<PollUpdate> {
        self.shared.updates.borrow().clone()
    }

    pub fn endpoint(&self) -> String {
        self.shared.engine().endpoint.clone()
    }

    pub fn generation(&self) -> u64 {
        self.shared.engine().generation
    }

    pub fn interval(&self) -> Duration {
        self.shared.engine().interval
    }

    pub fn is_running(&self) -> bool {
        self.shared.engine().timer.is_some()
    }

    pub fn families(&self) -> &MetricFamilies {
        &self.shared.families
    }
}

/// Issue a fetch for the current endpoint under a fresh generation.
fn issue(shared: &Arc<Shared>, engine: &mut Engine) -> u64 {
    engine.generation += 1;
    let generation = engine.generation;
    let endpoint = engine.endpoint.clone();

    debug!(%endpoint, generation, "issuing scrape");

    let task_shared = Arc::clone(shared);
    let handle = tokio::spawn(async move {
        let outcome = match task_shared.fetcher.fetch(&endpoint).await {
            Ok(body) => {
                let samples = parse(&body, &task_shared.families.prefixes());
                let state = aggregate(&samples, &task_shared.families);
                debug!(%endpoint, generation, samples = samples.len(), "scrape parsed");
                Ok(state)
            }
            Err(e) => {
                warn!(%endpoint, generation, error = %e, "scrape failed");
                Err(e)
            }
        };
        task_shared.publish(PollUpdate {
            generation,
            endpoint,
            outcome,
        });
    });

    // The previous fetch can no longer publish.
    if let Some(previous) = engine.in_flight.replace(handle.abort_handle()) {
        previous.abort();
    }
    generation
}

/// Recurring tick loop. Holds only a weak reference so a dropped poller
/// winds down on the next tick.
async fn run_timer(shared: Weak<Shared>, interval: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(strong) = shared.upgrade() else {
            break;
        };
        let mut engine = strong.engine();
        if engine.timer.is_none() {
            break;
        }
        issue(&strong, &mut engine);
    }
}
