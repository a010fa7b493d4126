// ── Core error types ──
//
// Domain errors from homewatch-core. Consumers never see raw process exit
// codes or sysfs paths; the `From<homewatch_api::Error>` impl translates
// collaborator failures into domain variants.

use thiserror::Error;

use crate::model::{ReadError, ReadErrorKind};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Hardware ─────────────────────────────────────────────────────
    #[error("Sensor read failed: {0}")]
    Read(#[from] ReadError),

    #[error("Actuator failure on pin {pin}: {message}")]
    Actuator { pin: u32, message: String },

    // ── Collaborators ────────────────────────────────────────────────
    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    #[error("Tunnel failure: {message}")]
    Tunnel { message: String },

    #[error("System command failed: {message}")]
    System { message: String },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid document '{id}': {reason}")]
    InvalidDocument { id: String, reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Monitor is not running")]
    MonitorStopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from collaborator errors ──────────────────────────────

impl From<homewatch_api::Error> for CoreError {
    fn from(err: homewatch_api::Error) -> Self {
        use homewatch_api::Error as Api;
        match err {
            Api::Launch { .. } | Api::ExitStatus { .. } | Api::UnknownSource(_) => {
                CoreError::Read(ReadError::new(ReadErrorKind::Launch, err.to_string()))
            }
            Api::NoData { .. } => {
                CoreError::Read(ReadError::new(ReadErrorKind::NoData, err.to_string()))
            }
            Api::Gpio { pin, reason } => CoreError::Actuator {
                pin,
                message: reason,
            },
            Api::Store { .. } | Api::Deserialization { .. } => CoreError::Persistence {
                message: err.to_string(),
            },
            Api::Tunnel(message) => CoreError::Tunnel { message },
            Api::Io(e) => CoreError::Internal(format!("I/O error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpio_errors_become_actuator_errors() {
        let err = CoreError::from(homewatch_api::Error::Gpio {
            pin: 16,
            reason: "busy".into(),
        });
        assert!(matches!(err, CoreError::Actuator { pin: 16, .. }));
    }

    #[test]
    fn missing_output_becomes_no_data_read_error() {
        let err = CoreError::from(homewatch_api::Error::NoData {
            program: "python3".into(),
        });
        match err {
            CoreError::Read(e) => assert_eq!(e.kind, ReadErrorKind::NoData),
            other => panic!("unexpected {other:?}"),
        }
    }
}
