// src/scheduler.rs
//! Periodic refresh trigger: an immediate tick on start, then one per
//! interval until stopped.

use futures::future::BoxFuture;
use metrics::counter;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Five minutes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(300_000);

pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Periodic refresh trigger, independent of whoever renders the dashboard.
///
/// Every tick runs as its own task: a slow tick never delays the next one,
/// so cycles may overlap. `stop` prevents further ticks but leaves ticks
/// already dispatched running to completion.
#[derive(Default)]
pub struct RefreshScheduler {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    timer: Option<JoinHandle<()>>,
    tick: Option<TickFn>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch `on_tick` now and then every `interval` until `stop`.
    /// Restarts the timer when already running. Must be called inside a
    /// tokio runtime.
    pub fn start<F, Fut>(&self, interval: Duration, on_tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let tick: TickFn = Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(on_tick()) });
        let interval = if interval.is_zero() {
            DEFAULT_REFRESH_INTERVAL
        } else {
            interval
        };

        let mut g = self.inner.lock().expect("scheduler mutex poisoned");
        if let Some(old) = g.timer.take() {
            old.abort();
        }

        dispatch(&tick);

        let looped = tick.clone();
        g.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                dispatch(&looped);
            }
        }));
        g.tick = Some(tick);

        tracing::info!(target: "scheduler", interval_ms = interval.as_millis() as u64, "refresh scheduler started");
    }

    /// Cancel the pending timer. No-op when already idle.
    pub fn stop(&self) {
        let mut g = self.inner.lock().expect("scheduler mutex poisoned");
        if let Some(timer) = g.timer.take() {
            timer.abort();
            tracing::info!(target: "scheduler", "refresh scheduler stopped");
        }
    }

    /// Run the registered tick once without touching the periodic schedule.
    /// Returns `false` if `start` was never called.
    pub fn trigger_now(&self) -> bool {
        let g = self.inner.lock().expect("scheduler mutex poisoned");
        match &g.tick {
            Some(tick) => {
                tracing::info!(target: "scheduler", "manual refresh requested");
                dispatch(tick);
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        let g = self.inner.lock().expect("scheduler mutex poisoned");
        match &g.timer {
            Some(t) if !t.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Idle,
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Ok(mut g) = self.inner.lock() {
            if let Some(timer) = g.timer.take() {
                timer.abort();
            }
        }
    }
}

fn dispatch(tick: &TickFn) {
    counter!("scheduler_ticks_total").increment(1);
    tokio::spawn(tick());
}
