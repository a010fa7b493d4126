// ── Tunnel status ──

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Lifecycle of the public tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "kebab-case")]
pub enum TunnelState {
    #[default]
    Uninitialized,
    Initializing,
    Connected(Url),
    Closed,
    Error(String),
}

/// Current tunnel state plus the subdomain attempt it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelStatus {
    pub state: TunnelState,
    pub subdomain_attempt: u32,
}

impl TunnelStatus {
    pub fn new(state: TunnelState, subdomain_attempt: u32) -> Self {
        Self {
            state,
            subdomain_attempt,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, TunnelState::Connected(_))
    }

    pub fn url(&self) -> Option<&Url> {
        match &self.state {
            TunnelState::Connected(url) => Some(url),
            _ => None,
        }
    }
}

impl fmt::Display for TunnelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            TunnelState::Uninitialized => f.write_str("uninitialized"),
            TunnelState::Initializing => {
                write!(f, "initializing (attempt {})", self.subdomain_attempt)
            }
            TunnelState::Connected(url) => write!(f, "connected: {url}"),
            TunnelState::Closed => f.write_str("closed"),
            TunnelState::Error(message) => write!(f, "error: {message}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_proxy_status() {
        let url = Url::parse("https://home.loca.lt").unwrap();
        let status = TunnelStatus::new(TunnelState::Connected(url), 0);
        assert_eq!(status.to_string(), "connected: https://home.loca.lt/");
        assert!(status.is_connected());

        let status = TunnelStatus::new(TunnelState::Initializing, 2);
        assert_eq!(status.to_string(), "initializing (attempt 2)");
        assert_eq!(TunnelStatus::default().to_string(), "uninitialized");
    }

    #[test]
    fn serializes_with_state_tag() {
        let status = TunnelStatus::new(TunnelState::Error("refused".into()), 1);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "state": { "state": "error", "detail": "refused" },
                "subdomainAttempt": 1
            })
        );
    }
}
