// ── Sensor readings ──

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical name of a sensor source, e.g. `photoresistor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceName(String);

impl SourceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SourceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── ReadError ───────────────────────────────────────────────────────

/// Why a reading could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReadErrorKind {
    /// The helper could not be started or exited unsuccessfully.
    Launch,
    /// The helper finished without printing anything.
    NoData,
    /// The helper printed something that is not a number.
    Parse,
    /// The helper did not finish in time.
    Timeout,
}

impl ReadErrorKind {
    /// Timeouts are reported alongside launch failures: the helper never
    /// delivered a result.
    pub fn is_launch_class(self) -> bool {
        matches!(self, Self::Launch | Self::Timeout)
    }
}

/// A failed read, tagged with its kind and a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ReadError {
    pub kind: ReadErrorKind,
    pub message: String,
}

impl ReadError {
    pub fn new(kind: ReadErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<homewatch_api::Error> for ReadError {
    fn from(err: homewatch_api::Error) -> Self {
        let kind = match err {
            homewatch_api::Error::NoData { .. } => ReadErrorKind::NoData,
            _ => ReadErrorKind::Launch,
        };
        Self::new(kind, err.to_string())
    }
}

// ── SensorReading ───────────────────────────────────────────────────

/// Outcome of one reader invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReadError>,
}

impl SensorReading {
    pub fn ok(value: f64) -> Self {
        Self {
            value: Some(value),
            success: true,
            error: None,
        }
    }

    pub fn failed(error: ReadError) -> Self {
        Self {
            value: None,
            success: false,
            error: Some(error),
        }
    }
}

impl From<Result<f64, ReadError>> for SensorReading {
    fn from(result: Result<f64, ReadError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(error) => Self::failed(error),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn failed_reading_serializes_without_value() {
        let reading = SensorReading::failed(ReadError::new(ReadErrorKind::Timeout, "slow"));
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "error": { "kind": "timeout", "message": "slow" }
            })
        );
    }

    #[test]
    fn api_errors_map_to_kinds() {
        let no_data = ReadError::from(homewatch_api::Error::NoData {
            program: "python3".into(),
        });
        assert_eq!(no_data.kind, ReadErrorKind::NoData);

        let launch = ReadError::from(homewatch_api::Error::UnknownSource("x".into()));
        assert_eq!(launch.kind, ReadErrorKind::Launch);
        assert!(ReadErrorKind::Timeout.is_launch_class());
        assert!(!ReadErrorKind::Parse.is_launch_class());
    }

    #[test]
    fn source_name_is_a_plain_string_on_the_wire() {
        let name = SourceName::from("thermistor");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"thermistor\"");
        assert_eq!(name.to_string(), "thermistor");
    }
}
