// ── Periodic scheduling ──
//
// A single loop fires ticks on a fixed interval, starting immediately.
// The `TickGate` keeps cycles from overlapping: a scheduled tick that
// finds a cycle in flight is dropped, not queued.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// How much work a tick does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TickKind {
    /// All sources, health, policy, persistence, publish.
    Full,
    /// Light source and policy only. Nothing is published.
    Minimal,
}

impl TickKind {
    pub fn for_observers(observers: usize) -> Self {
        if observers > 0 { Self::Full } else { Self::Minimal }
    }
}

/// Mutual exclusion for monitor cycles.
#[derive(Debug, Default)]
pub struct TickGate {
    busy: Mutex<()>,
}

impl TickGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter only if no cycle is running.
    pub fn try_enter(&self) -> Option<MutexGuard<'_, ()>> {
        self.busy.try_lock().ok()
    }

    /// Wait for the running cycle, if any, then enter.
    pub async fn enter(&self) -> MutexGuard<'_, ()> {
        self.busy.lock().await
    }
}

/// Call `tick` now and then every `period` until `cancel` fires.
///
/// Ticks that fall due while one is still running are skipped.
pub async fn run_periodic<F, Fut>(period: Duration, cancel: CancellationToken, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => tick().await,
        }
    }
    tracing::debug!("scheduler exiting");
}
