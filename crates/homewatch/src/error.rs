//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use homewatch_config::ConfigError;
use homewatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const SOURCE: i32 = 4;
    pub const ACTUATOR: i32 = 5;
    pub const STORE: i32 = 6;
    pub const TUNNEL: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(homewatch::config),
        help("Run `homewatch config show` to see the effective configuration.")
    )]
    Config(#[from] ConfigError),

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(homewatch::validation))]
    Validation { field: String, reason: String },

    // ── Hardware ─────────────────────────────────────────────────────

    #[error("Reading '{name}' failed: {reason}")]
    #[diagnostic(
        code(homewatch::source_failed),
        help("Run the helper configured under [monitor.sources.{name}] by hand to see its output.")
    )]
    SourceFailed { name: String, reason: String },

    #[error("Bulb pin {pin} could not be driven: {reason}")]
    #[diagnostic(
        code(homewatch::actuator),
        help("Check that the GPIO sysfs interface is available and writable, or set gpio.backend = \"memory\".")
    )]
    Actuator { pin: u32, reason: String },

    // ── Collaborators ────────────────────────────────────────────────

    #[error("Document store failed: {reason}")]
    #[diagnostic(code(homewatch::store), help("Check [store] dir permissions and free space."))]
    Store { reason: String },

    #[error("Tunnel failed: {reason}")]
    #[diagnostic(
        code(homewatch::tunnel),
        help("Check that the client in tunnel.command is installed and the network is up.")
    )]
    Tunnel { reason: String },

    #[error("System command failed: {reason}")]
    #[diagnostic(code(homewatch::system))]
    System { reason: String },

    // ── Runtime ──────────────────────────────────────────────────────

    #[error("Monitor stopped before the command finished")]
    #[diagnostic(code(homewatch::stopped))]
    Stopped,

    #[error("Internal error: {0}")]
    #[diagnostic(code(homewatch::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(homewatch::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            Self::SourceFailed { .. } => exit_code::SOURCE,
            Self::Actuator { .. } => exit_code::ACTUATOR,
            Self::Store { .. } => exit_code::STORE,
            Self::Tunnel { .. } => exit_code::TUNNEL,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Read(e) => CliError::SourceFailed {
                name: "sensor".into(),
                reason: e.to_string(),
            },
            CoreError::Actuator { pin, message } => CliError::Actuator {
                pin,
                reason: message,
            },
            CoreError::Persistence { message } => CliError::Store { reason: message },
            CoreError::InvalidDocument { id, reason } => CliError::Store {
                reason: format!("document '{id}' is invalid: {reason}"),
            },
            CoreError::Tunnel { message } => CliError::Tunnel { reason: message },
            CoreError::System { message } => CliError::System { reason: message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::MonitorStopped => CliError::Stopped,
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<homewatch_api::Error> for CliError {
    fn from(err: homewatch_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
