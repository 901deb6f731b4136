// src/fetch.rs
//! Fan-out fetch of every catalog source.
//!
//! Each source is fetched as its own future; a failing or slow source never
//! cancels or delays its siblings. Errors are captured into that source's
//! state and never returned to the caller.

use futures::stream::{FuturesUnordered, StreamExt};
use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::{DataSource, SourceCatalog};
use crate::error::FetchError;
use crate::http::HttpTransport;
use crate::metrics::ensure_metrics_described;
use crate::records::SourceRecords;
use crate::state::{banner_message, DashboardController, DashboardState};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Summary of one streamed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub succeeded: usize,
    pub failed: usize,
    /// Discarded as stale under `CyclePolicy::DiscardStale`.
    pub discarded: usize,
    pub last_error: Option<String>,
}

#[derive(Clone)]
pub struct FetchCoordinator {
    catalog: Arc<SourceCatalog>,
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl FetchCoordinator {
    pub fn new(catalog: Arc<SourceCatalog>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            catalog,
            transport,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    /// Fetch and parse one source under the per-request timeout.
    pub async fn fetch_source(&self, source: &DataSource) -> Result<SourceRecords, FetchError> {
        ensure_metrics_described();
        let slug = source.key.slug();
        counter!("dashboard_fetch_total", "source" => slug).increment(1);
        let t0 = Instant::now();

        let res = match tokio::time::timeout(
            self.timeout,
            self.transport.get(&source.endpoint, self.timeout),
        )
        .await
        {
            Ok(Ok(resp)) => resp
                .into_success_body()
                .and_then(|body| SourceRecords::parse(source.key, &body)),
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Err(FetchError::Timeout(self.timeout)),
        };

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("dashboard_fetch_ms", "source" => slug).record(ms);
        match &res {
            Ok(recs) => {
                tracing::debug!(target: "dashboard", source = slug, records = recs.len(), elapsed_ms = ms, "source fetched");
            }
            Err(e) => {
                counter!("dashboard_fetch_errors_total", "source" => slug).increment(1);
                tracing::warn!(target: "dashboard", source = slug, error = %e, elapsed_ms = ms, "source fetch failed");
            }
        }
        res
    }

    /// Run one full cycle and return the combined state.
    ///
    /// All requests are issued before any is awaited and the call returns once
    /// every source has settled. The banner is the last failure in catalog
    /// order, so the result does not depend on which fetch resolved first.
    pub async fn refresh_all(&self) -> DashboardState {
        let sources = self.catalog.list_sources();
        let outcomes =
            futures::future::join_all(sources.iter().map(|s| self.fetch_source(s))).await;

        let mut state = DashboardState::pending(&self.catalog);
        state.begin_cycle(1);
        let mut last_error = None;
        for (source, outcome) in sources.iter().zip(outcomes) {
            if let Some(msg) = state.settle(1, source.key, outcome) {
                last_error = Some(msg);
            }
        }
        state.last_refreshed_at = Some(chrono::Utc::now());
        state.last_error_message = last_error;
        record_cycle_done();
        state
    }

    /// Run one cycle committing each source into `controller` as soon as it
    /// settles, then close the cycle once all sources are done.
    pub async fn refresh_into(&self, controller: &DashboardController) -> CycleReport {
        let cycle = controller.begin_cycle();
        tracing::info!(target: "dashboard", cycle, sources = self.catalog.len(), "refresh cycle started");

        let mut pending: FuturesUnordered<_> = self
            .catalog
            .list_sources()
            .iter()
            .enumerate()
            .map(|(idx, s)| async move { (idx, s.key, self.fetch_source(s).await) })
            .collect();

        let mut report = CycleReport {
            cycle,
            succeeded: 0,
            failed: 0,
            discarded: 0,
            last_error: None,
        };
        // (catalog index, message) of the failure that sorts last
        let mut last_failure: Option<(usize, String)> = None;

        while let Some((idx, key, outcome)) = pending.next().await {
            let failure = outcome.as_ref().err().map(|e| banner_message(key, e));
            if !controller.apply(cycle, key, outcome) {
                report.discarded += 1;
                counter!("dashboard_stale_updates_total").increment(1);
                continue;
            }
            match failure {
                None => report.succeeded += 1,
                Some(msg) => {
                    report.failed += 1;
                    if last_failure.as_ref().map_or(true, |(i, _)| idx > *i) {
                        last_failure = Some((idx, msg));
                    }
                }
            }
        }

        report.last_error = last_failure.map(|(_, msg)| msg);
        controller.finish_cycle(cycle, report.last_error.clone());
        record_cycle_done();

        tracing::info!(
            target: "dashboard",
            cycle,
            succeeded = report.succeeded,
            failed = report.failed,
            discarded = report.discarded,
            "refresh cycle finished"
        );
        report
    }
}

fn record_cycle_done() {
    counter!("dashboard_cycles_total").increment(1);
    let now = chrono::Utc::now().timestamp().max(0) as f64;
    gauge!("dashboard_last_refresh_ts").set(now);
}
