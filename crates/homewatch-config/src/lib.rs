//! Configuration for the homewatch daemon and its diagnostic commands.
//!
//! A single TOML file, layered under `HOMEWATCH_*` environment overrides,
//! and translation into the runtime configs of `homewatch-core`. Durations
//! are written the way people say them (`"5m"`, `"30s"`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use homewatch_api::{DEFAULT_HEALTH_SCRIPT, ReaderCommand, SysfsGpio};
use homewatch_core::{HourWindow, MonitorConfig, PolicyConfig, SourceName, TunnelConfig};

/// Prefix of environment overrides. Nested keys are joined with `__`,
/// e.g. `HOMEWATCH_MONITOR__INTERVAL=1m`.
pub const ENV_PREFIX: &str = "HOMEWATCH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorSection,
    pub health: HealthSection,
    pub gpio: GpioSection,
    pub store: StoreSection,
    pub policy: PolicySection,
    pub tunnel: TunnelSection,
    pub system: SystemSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Time between scheduled ticks.
    pub interval: String,
    /// Upper bound on one sensor helper run.
    pub reader_timeout: String,
    /// Source feeding the bulb policy. Must appear in `sources`.
    pub light_source: String,
    /// Helper program per logical source.
    pub sources: BTreeMap<String, ReaderCommand>,
}

impl Default for MonitorSection {
    fn default() -> Self {
        let helper = |script: &str| {
            ReaderCommand::new("python3", [format!("/usr/local/lib/homewatch/{script}")])
        };
        Self {
            interval: "5m".into(),
            reader_timeout: "10s".into(),
            light_source: "photoresistor".into(),
            sources: BTreeMap::from([
                ("photoresistor".into(), helper("photoresistor_with_a2d.py")),
                ("thermistor".into(), helper("thermistor_with_a2d.py")),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthSection {
    /// Shell script whose output is the health report.
    pub script: String,
    pub timeout: String,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            script: DEFAULT_HEALTH_SCRIPT.into(),
            timeout: "15s".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioBackend {
    #[default]
    Sysfs,
    /// Keep the pin level in memory. For hosts without the relay attached.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GpioSection {
    pub backend: GpioBackend,
    pub bulb_pin: u32,
    pub sysfs_root: PathBuf,
}

impl Default for GpioSection {
    fn default() -> Self {
        Self {
            backend: GpioBackend::Sysfs,
            bulb_pin: MonitorConfig::DEFAULT_BULB_PIN,
            sysfs_root: PathBuf::from(SysfsGpio::DEFAULT_ROOT),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    /// Directory of the JSON document files. Defaults to the platform data dir.
    pub dir: Option<PathBuf>,
    /// How often the file backend looks for documents written by other processes.
    pub poll_interval: String,
    /// Remote-log records kept before the log file is rotated.
    pub max_log_records: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            dir: None,
            poll_interval: "2s".into(),
            max_log_records: 500,
        }
    }
}

impl StoreSection {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(data_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicySection {
    pub light_dark_threshold: f64,
    pub evening: HourWindow,
    pub pre_dawn: HourWindow,
}

impl Default for PolicySection {
    fn default() -> Self {
        let policy = PolicyConfig::default();
        Self {
            light_dark_threshold: policy.light_dark_threshold,
            evening: policy.evening,
            pre_dawn: policy.pre_dawn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelSection {
    pub enabled: bool,
    pub port: u16,
    pub subdomain: String,
    pub max_subdomain_attempts: u32,
    pub reconnect_delay: String,
    pub cooldown: String,
    /// Client command line. `{port}` and `{subdomain}` are substituted.
    pub command: Vec<String>,
    /// How long the client may take to print its URL.
    pub startup_timeout: String,
}

impl Default for TunnelSection {
    fn default() -> Self {
        let tunnel = TunnelConfig::default();
        Self {
            enabled: true,
            port: tunnel.port,
            subdomain: tunnel.subdomain,
            max_subdomain_attempts: tunnel.max_subdomain_attempts,
            reconnect_delay: "30s".into(),
            cooldown: "15m".into(),
            command: ["lt", "--port", "{port}", "--subdomain", "{subdomain}"]
                .map(String::from)
                .to_vec(),
            startup_timeout: "30s".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemSection {
    pub reboot: Vec<String>,
    pub shutdown: Vec<String>,
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            reboot: vec!["sudo".into(), "reboot".into()],
            shutdown: ["sudo", "shutdown", "-h", "now"].map(String::from).to_vec(),
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "homewatch", "homewatch")
}

fn home_fallback(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.extend(parts);
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".config", "homewatch", "config.toml"]),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default directory of the document store.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".local", "share", "homewatch"]),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Defaults, then the TOML file at `path` (if present), then environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load and validate the config. `None` means the platform default path.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config: Config = figment(&path).extract()?;
    config.validate()?;
    Ok(config)
}

// ── Translation ─────────────────────────────────────────────────────

fn duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    let parsed = humantime::parse_duration(raw).map_err(|e| invalid(field, e.to_string()))?;
    if parsed.is_zero() {
        return Err(invalid(field, "must be greater than zero"));
    }
    Ok(parsed)
}

fn hour_window(field: &str, window: HourWindow) -> Result<HourWindow, ConfigError> {
    if window.start > 23 || window.end > 23 {
        return Err(invalid(
            field,
            format!("hours must be 0-23, got {}-{}", window.start, window.end),
        ));
    }
    Ok(window)
}

fn is_valid_subdomain(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl Config {
    /// Check every field that translation would otherwise reject.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.monitor_config()?;
        self.tunnel_config()?;
        if self.tunnel.command.is_empty() {
            return Err(invalid("tunnel.command", "must name a program"));
        }
        duration("tunnel.startup_timeout", &self.tunnel.startup_timeout)?;
        self.store_poll_interval()?;
        if self.store.max_log_records == 0 {
            return Err(invalid("store.max_log_records", "must be at least 1"));
        }
        if self.system.reboot.is_empty() || self.system.shutdown.is_empty() {
            return Err(invalid("system", "reboot and shutdown commands must not be empty"));
        }
        Ok(())
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        let monitor = &self.monitor;
        if !monitor.sources.contains_key(&monitor.light_source) {
            return Err(invalid(
                "monitor.light_source",
                format!("'{}' has no entry in [monitor.sources]", monitor.light_source),
            ));
        }
        if let Some((name, _)) = monitor.sources.iter().find(|(_, c)| c.program.is_empty()) {
            return Err(invalid(
                "monitor.sources",
                format!("source '{name}' has an empty program"),
            ));
        }

        let threshold = self.policy.light_dark_threshold;
        if !threshold.is_finite() {
            return Err(invalid("policy.light_dark_threshold", "must be a finite number"));
        }

        Ok(MonitorConfig {
            interval: duration("monitor.interval", &monitor.interval)?,
            reader_timeout: duration("monitor.reader_timeout", &monitor.reader_timeout)?,
            health_timeout: duration("health.timeout", &self.health.timeout)?,
            sources: monitor
                .sources
                .keys()
                .map(|name| SourceName::from(name.as_str()))
                .collect(),
            light_source: SourceName::from(monitor.light_source.as_str()),
            bulb_pin: self.gpio.bulb_pin,
            policy: PolicyConfig {
                light_dark_threshold: threshold,
                evening: hour_window("policy.evening", self.policy.evening)?,
                pre_dawn: hour_window("policy.pre_dawn", self.policy.pre_dawn)?,
            },
        })
    }

    pub fn tunnel_config(&self) -> Result<TunnelConfig, ConfigError> {
        let tunnel = &self.tunnel;
        if tunnel.port == 0 {
            return Err(invalid("tunnel.port", "must not be 0"));
        }
        if !is_valid_subdomain(&tunnel.subdomain) {
            return Err(invalid(
                "tunnel.subdomain",
                format!(
                    "'{}' must be lowercase letters, digits and inner hyphens",
                    tunnel.subdomain
                ),
            ));
        }
        if tunnel.max_subdomain_attempts == 0 {
            return Err(invalid("tunnel.max_subdomain_attempts", "must be at least 1"));
        }

        Ok(TunnelConfig {
            port: tunnel.port,
            subdomain: tunnel.subdomain.clone(),
            max_subdomain_attempts: tunnel.max_subdomain_attempts,
            reconnect_delay: duration("tunnel.reconnect_delay", &tunnel.reconnect_delay)?,
            cooldown: duration("tunnel.cooldown", &tunnel.cooldown)?,
        })
    }

    /// Time the tunnel client may take to announce its URL.
    pub fn tunnel_startup_timeout(&self) -> Result<Duration, ConfigError> {
        duration("tunnel.startup_timeout", &self.tunnel.startup_timeout)
    }

    pub fn store_poll_interval(&self) -> Result<Duration, ConfigError> {
        duration("store.poll_interval", &self.store.poll_interval)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_translate() {
        let config = Config::default();
        config.validate().unwrap();

        let monitor = config.monitor_config().unwrap();
        assert_eq!(monitor.interval, Duration::from_secs(300));
        assert_eq!(monitor.bulb_pin, 16);
        assert_eq!(monitor.light_source.as_str(), "photoresistor");
        assert_eq!(monitor.sources.len(), 2);
        assert_eq!(monitor.policy, PolicyConfig::default());

        assert_eq!(config.tunnel_config().unwrap(), TunnelConfig::default());
    }

    #[test]
    fn file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [monitor]
                interval = "1m"

                [policy]
                light_dark_threshold = 200.0
                evening = { start = 17, end = 23 }

                [tunnel]
                subdomain = "porch"
                "#,
            )?;
            jail.set_env("HOMEWATCH_TUNNEL__PORT", "9000");
            jail.set_env("HOMEWATCH_GPIO__BACKEND", "memory");

            let config = load_config(Some(Path::new("config.toml"))).map_err(|e| e.to_string())?;
            let monitor = config.monitor_config().map_err(|e| e.to_string())?;
            assert_eq!(monitor.interval, Duration::from_secs(60));
            assert_eq!(monitor.policy.evening, HourWindow::new(17, 23));
            assert_eq!(monitor.policy.pre_dawn, HourWindow::new(0, 6));
            assert!((monitor.policy.light_dark_threshold - 200.0).abs() < f64::EPSILON);

            let tunnel = config.tunnel_config().map_err(|e| e.to_string())?;
            assert_eq!(tunnel.port, 9000);
            assert_eq!(tunnel.subdomain, "porch");
            assert_eq!(config.gpio.backend, GpioBackend::Memory);
            Ok(())
        });
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.monitor, MonitorSection::default());
    }

    #[test]
    fn rejects_unknown_light_source() {
        let mut config = Config::default();
        config.monitor.light_source = "lux".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("monitor.light_source"));
    }

    #[test]
    fn rejects_bad_durations_and_hours() {
        let mut config = Config::default();
        config.monitor.interval = "soon".into();
        assert!(config.monitor_config().is_err());

        let mut config = Config::default();
        config.monitor.interval = "0s".into();
        assert!(config.monitor_config().is_err());

        let mut config = Config::default();
        config.policy.pre_dawn = HourWindow::new(0, 24);
        assert!(config.monitor_config().is_err());
    }

    #[test]
    fn store_watching_and_rotation_are_validated() {
        let config = Config::default();
        assert_eq!(config.store_poll_interval().unwrap(), Duration::from_secs(2));
        assert_eq!(config.store.max_log_records, 500);

        let mut config = Config::default();
        config.store.poll_interval = "0s".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store.poll_interval"));

        let mut config = Config::default();
        config.store.max_log_records = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store.max_log_records"));
    }

    #[test]
    fn rejects_bad_subdomains() {
        for name in ["", "Home", "-home", "home_1"] {
            let mut config = Config::default();
            config.tunnel.subdomain = name.into();
            assert!(config.tunnel_config().is_err(), "{name:?}");
        }
    }

    #[test]
    fn renders_back_to_toml() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[monitor.sources.photoresistor]"));
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
