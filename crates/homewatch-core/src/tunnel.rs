//! Supervision of the public tunnel.
//!
//! The supervisor runs one loop for the life of the process:
//!
//! ```text
//! Uninitialized → Initializing → Connected ─(closed)→ Closed ─(reconnect delay)→ Initializing
//!                      │
//!                      ├─(open failed)→ Error ─(backoff)→ Initializing
//!                      └─(subdomains exhausted)→ Error ─(cooldown)→ Initializing
//! ```
//!
//! A round of negotiation asks for the preferred subdomain first and then
//! for numbered alternates. A granted URL whose subdomain differs from the
//! requested one is closed straight away. Nothing here is ever fatal to the
//! caller; failures only show up in the published [`TunnelStatus`].

use std::sync::Arc;
use std::time::Duration;

use homewatch_api::{TunnelProvider, TunnelSession, subdomain_of};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TunnelConfig;
use crate::model::{TunnelState, TunnelStatus};

/// Cheaply cloneable handle to the tunnel supervisor.
#[derive(Clone)]
pub struct TunnelManager {
    inner: Arc<TunnelInner>,
}

struct TunnelInner {
    config: TunnelConfig,
    provider: Arc<dyn TunnelProvider>,
    status: watch::Sender<TunnelStatus>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TunnelManager {
    pub fn new(config: TunnelConfig, provider: Arc<dyn TunnelProvider>) -> Self {
        let (status, _) = watch::channel(TunnelStatus::default());
        Self {
            inner: Arc::new(TunnelInner {
                config,
                provider,
                status,
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.inner.config
    }

    /// Spawn the supervisor. Calling this again while it runs does nothing.
    pub async fn start(&self) {
        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(supervise(inner)));
        info!(
            port = self.inner.config.port,
            subdomain = %self.inner.config.subdomain,
            "tunnel supervisor started"
        );
    }

    pub fn status(&self) -> TunnelStatus {
        self.inner.status.borrow().clone()
    }

    /// Receive every status transition.
    pub fn subscribe(&self) -> watch::Receiver<TunnelStatus> {
        self.inner.status.subscribe()
    }

    /// Close the tunnel and stop the supervisor.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }
        debug!("tunnel supervisor stopped");
    }
}

// ── Supervisor loop ──────────────────────────────────────────────────

enum Negotiation {
    Connected(Box<dyn TunnelSession>),
    Exhausted,
    Failed(String),
    Cancelled,
}

async fn supervise(inner: Arc<TunnelInner>) {
    let cancel = inner.cancel.clone();
    let config = &inner.config;
    let mut failures: u32 = 0;

    loop {
        let delay = match negotiate(&inner).await {
            Negotiation::Cancelled => break,

            Negotiation::Connected(mut session) => {
                failures = 0;
                let closed = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    reason = session.closed() => Some(reason),
                };
                let Some(reason) = closed else {
                    session.close().await;
                    break;
                };
                warn!(%reason, "tunnel closed unexpectedly");
                set_status(&inner, TunnelState::Closed, 0);
                config.reconnect_delay
            }

            Negotiation::Exhausted => {
                warn!(
                    attempts = config.max_subdomain_attempts,
                    cooldown_secs = config.cooldown.as_secs(),
                    "no attempt got the requested subdomain, cooling down"
                );
                set_status(
                    &inner,
                    TunnelState::Error(format!(
                        "subdomain '{}' unavailable after {} attempts",
                        config.subdomain, config.max_subdomain_attempts
                    )),
                    0,
                );
                config.cooldown
            }

            Negotiation::Failed(message) => {
                let delay = calculate_backoff(failures, config.reconnect_delay, config.cooldown);
                warn!(error = %message, attempt = failures, "tunnel open failed");
                set_status(&inner, TunnelState::Error(message), 0);
                failures = failures.saturating_add(1);
                delay
            }
        };

        debug!(delay_ms = delay.as_millis(), "waiting before next tunnel attempt");
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!("tunnel supervisor exiting");
}

/// One round: preferred subdomain first, then alternates, up to the bound.
async fn negotiate(inner: &TunnelInner) -> Negotiation {
    let config = &inner.config;

    for attempt in 0..config.max_subdomain_attempts {
        let requested = config.subdomain_for(attempt);
        set_status(inner, TunnelState::Initializing, attempt);

        let opened = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => return Negotiation::Cancelled,
            opened = inner.provider.open(config.port, &requested) => opened,
        };

        let mut session = match opened {
            Ok(session) => session,
            Err(e) => return Negotiation::Failed(e.to_string()),
        };

        let url = session.url().clone();
        if subdomain_of(&url) == Some(requested.as_str()) {
            info!(%url, attempt, "tunnel connected");
            set_status(inner, TunnelState::Connected(url), attempt);
            return Negotiation::Connected(session);
        }

        info!(%url, %requested, attempt, "tunnel granted a different subdomain, retrying");
        session.close().await;
    }

    Negotiation::Exhausted
}

fn set_status(inner: &TunnelInner, state: TunnelState, subdomain_attempt: u32) {
    inner
        .status
        .send_replace(TunnelStatus::new(state, subdomain_attempt));
}

/// Exponential backoff with jitter, capped at `max`.
fn calculate_backoff(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = initial.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(max.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).clamp(0.0, max.as_secs_f64());

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
