//! `homewatch run`: the monitor daemon.
//!
//! Starts the tunnel supervisor (unless disabled) and the monitor, then waits
//! for SIGINT, SIGTERM, or a `terminate` command.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use homewatch_config::Config;
use homewatch_core::{Command, Monitor, TunnelManager, TunnelStatus};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::output;
use crate::wiring;

pub async fn handle(args: RunArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let monitor_config = config.monitor_config()?;

    let tunnel = if config.tunnel.enabled && !args.no_tunnel {
        let provider = wiring::tunnel_provider(config)?;
        Some(TunnelManager::new(config.tunnel_config()?, Arc::new(provider)))
    } else {
        tracing::info!("tunnel disabled");
        None
    };
    let tunnel_status = tunnel.as_ref().map_or_else(
        || watch::channel(TunnelStatus::default()).1,
        TunnelManager::subscribe,
    );

    tracing::info!(
        interval = %humantime::format_duration(monitor_config.interval),
        light_source = %monitor_config.light_source,
        "starting monitor"
    );
    let deps = wiring::monitor_deps(config, tunnel_status).await?;
    let monitor = Monitor::new(monitor_config, deps).await?;

    let mut helpers: Vec<JoinHandle<()>> = Vec::new();
    if args.print_events {
        // Subscribed before start so the first tick already sees an observer.
        helpers.push(tokio::spawn(print_events(monitor.events(), global.quiet)));
    }

    if let Some(tunnel) = &tunnel {
        tunnel.start().await;
    }
    monitor.start().await;

    if args.stdin_commands {
        helpers.push(tokio::spawn(stdin_commands(monitor.clone(), global.quiet)));
    }

    tokio::select! {
        reason = shutdown_signal() => {
            tracing::warn!(signal = reason, "shutting down");
        }
        () = monitor.stopped() => {
            tracing::info!("monitor terminated");
        }
    }

    monitor.shutdown().await;
    if let Some(tunnel) = &tunnel {
        tunnel.shutdown().await;
    }
    for handle in helpers {
        handle.abort();
    }
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<homewatch_core::MonitorEvent>, quiet: bool) {
    loop {
        match events.recv().await {
            Ok(event) => output::print_output(&output::render_json_compact(&event), quiet),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// One JSON [`Command`] per line. Results go to stdout as compact JSON.
async fn stdin_commands(monitor: Monitor, quiet: bool) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let cmd: Command = match serde_json::from_str(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!(error = %e, line, "ignoring malformed command");
                continue;
            }
        };
        match monitor.execute(cmd).await {
            Ok(result) => output::print_output(&output::render_json_compact(&result), quiet),
            Err(e) => tracing::warn!(error = %e, "command failed"),
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            return ctrl_c().await;
        }
    };
    tokio::select! {
        reason = ctrl_c() => reason,
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "SIGINT handler unavailable");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
