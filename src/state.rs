// src/state.rs
//! Per-source health/freshness and the authoritative dashboard state.
//!
//! `DashboardState` is a plain value. `DashboardController` owns the shared
//! copy; the coordinator only hands it per-source updates.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::catalog::{SourceCatalog, SourceKey};
use crate::error::FetchError;
use crate::records::SourceRecords;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceState {
    pub status: FetchStatus,
    pub records: Option<SourceRecords>,
    pub error: Option<String>,
    /// When this source last settled (success or failure).
    pub updated_at: Option<DateTime<Utc>>,
    /// Cycle that produced the current status.
    pub cycle: u64,
}

impl SourceState {
    pub fn pending() -> Self {
        Self {
            status: FetchStatus::Pending,
            records: None,
            error: None,
            updated_at: None,
            cycle: 0,
        }
    }
}

/// How updates from overlapping cycles are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CyclePolicy {
    /// Whatever lands last for a source key wins, regardless of cycle.
    #[default]
    LastWriteWins,
    /// Updates from a cycle older than the newest one already committed for
    /// that source are dropped.
    DiscardStale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardState {
    pub sources: IndexMap<SourceKey, SourceState>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
}

impl DashboardState {
    /// Every catalog source in `Pending`, nothing refreshed yet.
    pub fn pending(catalog: &SourceCatalog) -> Self {
        Self {
            sources: catalog.keys().map(|k| (k, SourceState::pending())).collect(),
            last_refreshed_at: None,
            last_error_message: None,
        }
    }

    pub fn source(&self, key: SourceKey) -> Option<&SourceState> {
        self.sources.get(&key)
    }

    /// Records to render for a source: fresh on `Success`, the previous
    /// cycle's while `Pending`, none once `Failed`.
    pub fn records(&self, key: SourceKey) -> Option<&SourceRecords> {
        self.sources
            .get(&key)
            .filter(|s| s.status != FetchStatus::Failed)
            .and_then(|s| s.records.as_ref())
    }

    pub fn count(&self, status: FetchStatus) -> usize {
        self.sources.values().filter(|s| s.status == status).count()
    }

    /// Open a new cycle: every source goes back to `Pending`. Previously
    /// fetched records stay visible until the source settles again.
    pub fn begin_cycle(&mut self, cycle: u64) {
        for s in self.sources.values_mut() {
            s.status = FetchStatus::Pending;
            s.error = None;
            s.cycle = cycle;
        }
    }

    /// Settle one source. Returns the banner message on failure.
    pub fn settle(
        &mut self,
        cycle: u64,
        key: SourceKey,
        outcome: Result<SourceRecords, FetchError>,
    ) -> Option<String> {
        let now = Utc::now();
        let entry = self.sources.entry(key).or_insert_with(SourceState::pending);
        entry.cycle = cycle;
        entry.updated_at = Some(now);
        match outcome {
            Ok(records) => {
                entry.status = FetchStatus::Success;
                entry.records = Some(records);
                entry.error = None;
                None
            }
            Err(e) => {
                entry.status = FetchStatus::Failed;
                entry.records = None;
                entry.error = Some(e.to_string());
                Some(banner_message(key, &e))
            }
        }
    }
}

/// Message shown in the non-blocking error banner.
pub fn banner_message(key: SourceKey, err: &FetchError) -> String {
    format!("Error fetching {}: {}", key.title(), err)
}

#[derive(Debug)]
struct Inner {
    state: DashboardState,
    /// Newest cycle committed per source (used by `DiscardStale`).
    committed: HashMap<SourceKey, u64>,
    next_cycle: u64,
    last_finished_cycle: u64,
}

/// Owner of the authoritative `DashboardState`.
///
/// Each write is one short critical section; there is no lock spanning
/// several sources.
#[derive(Debug)]
pub struct DashboardController {
    inner: RwLock<Inner>,
    policy: CyclePolicy,
}

impl DashboardController {
    pub fn new(catalog: &SourceCatalog, policy: CyclePolicy) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: DashboardState::pending(catalog),
                committed: HashMap::new(),
                next_cycle: 1,
                last_finished_cycle: 0,
            }),
            policy,
        }
    }

    pub fn policy(&self) -> CyclePolicy {
        self.policy
    }

    /// Allocate the next cycle number and mark all sources `Pending`.
    pub fn begin_cycle(&self) -> u64 {
        let mut g = self.inner.write().expect("dashboard state lock poisoned");
        let cycle = g.next_cycle;
        g.next_cycle += 1;
        g.state.begin_cycle(cycle);
        cycle
    }

    /// Commit one source outcome. Returns `false` when the update was
    /// discarded as stale.
    pub fn apply(
        &self,
        cycle: u64,
        key: SourceKey,
        outcome: Result<SourceRecords, FetchError>,
    ) -> bool {
        let mut g = self.inner.write().expect("dashboard state lock poisoned");
        if self.policy == CyclePolicy::DiscardStale {
            let newest = g.committed.get(&key).copied().unwrap_or(0);
            if cycle < newest {
                tracing::debug!(target: "dashboard", source = %key, cycle, newest, "stale update discarded");
                return false;
            }
        }
        g.committed.insert(key, cycle);
        g.state.settle(cycle, key, outcome);
        true
    }

    /// Close a cycle: stamp the refresh time and set the banner to the last
    /// failure of the cycle (in catalog order), or clear it.
    pub fn finish_cycle(&self, cycle: u64, last_error: Option<String>) {
        let mut g = self.inner.write().expect("dashboard state lock poisoned");
        if self.policy == CyclePolicy::DiscardStale && cycle < g.last_finished_cycle {
            return;
        }
        g.last_finished_cycle = g.last_finished_cycle.max(cycle);
        g.state.last_refreshed_at = Some(Utc::now());
        g.state.last_error_message = last_error;
    }

    pub fn snapshot(&self) -> DashboardState {
        self.inner
            .read()
            .expect("dashboard state lock poisoned")
            .state
            .clone()
    }
}
