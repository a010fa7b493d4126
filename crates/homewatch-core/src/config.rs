// ── Runtime configuration ──
//
// These types describe how the monitor and the tunnel supervisor behave.
// They never touch disk: `homewatch-config` builds them from the on-disk
// file and hands them in.

use std::time::Duration;

use crate::model::{LightStatus, SourceName};
use crate::policy::HourWindow;

/// Thresholds and windows for the sensor-mode bulb policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    /// Readings at or above this count as dark.
    pub light_dark_threshold: f64,
    /// Hours during which the bulb is switched on regardless of light.
    pub evening: HourWindow,
    /// Hours during which the bulb is switched off regardless of light.
    pub pre_dawn: HourWindow,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            light_dark_threshold: LightStatus::LightDark.bound().unwrap_or(217.0),
            evening: HourWindow::new(18, 23),
            pre_dawn: HourWindow::new(0, 6),
        }
    }
}

/// Monitor loop configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Time between scheduled ticks. Default: 5 minutes.
    pub interval: Duration,
    /// Upper bound on a single sensor helper run.
    pub reader_timeout: Duration,
    /// Upper bound on the health probe.
    pub health_timeout: Duration,
    /// Sources read on a full tick, in snapshot order.
    pub sources: Vec<SourceName>,
    /// The source whose reading feeds the bulb policy.
    pub light_source: SourceName,
    /// GPIO pin driving the bulb.
    pub bulb_pin: u32,
    pub policy: PolicyConfig,
}

impl MonitorConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);
    pub const DEFAULT_BULB_PIN: u32 = 16;

    /// Sources for a full tick, with the light source appended if absent.
    pub fn full_sources(&self) -> Vec<SourceName> {
        let mut sources = self.sources.clone();
        if !sources.contains(&self.light_source) {
            sources.push(self.light_source.clone());
        }
        sources
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            reader_timeout: Duration::from_secs(10),
            health_timeout: Duration::from_secs(15),
            sources: vec![
                SourceName::from("thermistor"),
                SourceName::from("photoresistor"),
            ],
            light_source: SourceName::from("photoresistor"),
            bulb_pin: Self::DEFAULT_BULB_PIN,
            policy: PolicyConfig::default(),
        }
    }
}

/// Tunnel supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Local port the tunnel forwards to.
    pub port: u16,
    /// Preferred subdomain. Alternates are `<subdomain>-<n>`.
    pub subdomain: String,
    /// Subdomains tried per round before cooling down.
    pub max_subdomain_attempts: u32,
    /// Delay after an unexpected close, and the first delay after an open failure.
    pub reconnect_delay: Duration,
    /// Pause after a round of attempts is exhausted. Also caps backoff.
    pub cooldown: Duration,
}

impl TunnelConfig {
    /// Subdomain requested on `attempt` (0-based).
    pub fn subdomain_for(&self, attempt: u32) -> String {
        if attempt == 0 {
            self.subdomain.clone()
        } else {
            format!("{}-{attempt}", self.subdomain)
        }
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            subdomain: "homewatch".into(),
            max_subdomain_attempts: 3,
            reconnect_delay: Duration::from_secs(30),
            cooldown: Duration::from_secs(15 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let config = MonitorConfig::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.bulb_pin, 16);
        assert!((config.policy.light_dark_threshold - 217.0).abs() < f64::EPSILON);
    }

    #[test]
    fn light_source_is_always_read_on_full_ticks() {
        let config = MonitorConfig {
            sources: vec![SourceName::from("thermistor")],
            ..MonitorConfig::default()
        };
        assert_eq!(
            config.full_sources(),
            vec![SourceName::from("thermistor"), SourceName::from("photoresistor")]
        );
    }

    #[test]
    fn alternate_subdomains_are_numbered() {
        let config = TunnelConfig {
            subdomain: "cottage".into(),
            ..TunnelConfig::default()
        };
        assert_eq!(config.subdomain_for(0), "cottage");
        assert_eq!(config.subdomain_for(2), "cottage-2");
    }
}
