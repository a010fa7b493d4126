//! `homewatch tunnel-check`: open the tunnel once, report what was granted, close it.

use serde::Serialize;

use homewatch_api::{TunnelProvider, subdomain_of};
use homewatch_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, Painter};
use crate::wiring;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TunnelCheck {
    port: u16,
    requested: String,
    url: String,
    granted: Option<String>,
    matched: bool,
}

pub async fn handle(config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let provider = wiring::tunnel_provider(config)?;
    let port = config.tunnel.port;
    let requested = config.tunnel.subdomain.clone();

    tracing::info!(port, subdomain = %requested, "opening tunnel");
    let mut session = provider
        .open(port, &requested)
        .await
        .map_err(|e| CliError::Tunnel {
            reason: e.to_string(),
        })?;

    let granted = subdomain_of(session.url()).map(str::to_owned);
    let view = TunnelCheck {
        port,
        matched: granted.as_deref() == Some(requested.as_str()),
        url: session.url().to_string(),
        granted,
        requested,
    };
    session.close().await;

    let painter = Painter::new(global.color);
    let rendered = output::render_single(global.output, &view, |v| {
        let verdict = if v.matched {
            painter.good("preferred subdomain granted")
        } else {
            painter.bad(&format!(
                "asked for '{}', got '{}'",
                v.requested,
                v.granted.as_deref().unwrap_or("?")
            ))
        };
        format!("{} ({verdict})", v.url)
    });
    output::print_output(&rendered, global.quiet);
    Ok(())
}
