// ── Periodic snapshot ──

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::reading::{SensorReading, SourceName};
use super::settings::{BulbState, ControlMode};

/// Human-readable form of [`LightStatus::THRESHOLDS`], shipped with every snapshot.
pub const LIGHT_LEGEND: &str = "Good: 187, Medium: 200, LightDark: 217, Dark: 255, Blackout: inf";

/// Classification of a photoresistor reading. Higher readings are darker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum LightStatus {
    Good,
    Medium,
    LightDark,
    Dark,
    Blackout,
}

impl LightStatus {
    /// Upper bounds in ascending order. Anything above the last is `Blackout`.
    pub const THRESHOLDS: [(f64, LightStatus); 4] = [
        (187.0, LightStatus::Good),
        (200.0, LightStatus::Medium),
        (217.0, LightStatus::LightDark),
        (255.0, LightStatus::Dark),
    ];

    /// The first status whose bound the reading does not exceed.
    pub fn classify(reading: f64) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(bound, _)| reading <= *bound)
            .map_or(Self::Blackout, |(_, status)| *status)
    }

    /// Upper bound of this status, `None` for `Blackout`.
    pub fn bound(self) -> Option<f64> {
        Self::THRESHOLDS
            .iter()
            .find(|(_, status)| *status == self)
            .map(|(bound, _)| *bound)
    }
}

/// Result of the host health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn ok(text: String) -> Self {
        Self {
            success: true,
            text: Some(text),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: None,
            error: Some(error.into()),
        }
    }
}

/// Everything one full cycle learned, handed to observers once complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub readings: IndexMap<SourceName, SensorReading>,
    pub health: HealthReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photoresistor_status: Option<LightStatus>,
    pub photoresistor_legend: String,
    pub bulb_state: BulbState,
    pub bulb_control_mode: ControlMode,
    pub connection_count: usize,
    pub proxy_status: String,
    pub time: DateTime<Utc>,
    pub pid: u32,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Snapshot {
    pub fn reading(&self, source: &str) -> Option<&SensorReading> {
        self.readings.get(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_against_ascending_thresholds() {
        assert_eq!(LightStatus::classify(150.0), LightStatus::Good);
        assert_eq!(LightStatus::classify(187.0), LightStatus::Good);
        assert_eq!(LightStatus::classify(187.5), LightStatus::Medium);
        assert_eq!(LightStatus::classify(217.0), LightStatus::LightDark);
        assert_eq!(LightStatus::classify(220.0), LightStatus::Dark);
        assert_eq!(LightStatus::classify(900.0), LightStatus::Blackout);
        assert_eq!(LightStatus::classify(f64::NAN), LightStatus::Blackout);
    }

    #[test]
    fn legend_matches_thresholds() {
        for (bound, status) in LightStatus::THRESHOLDS {
            assert!(LIGHT_LEGEND.contains(&format!("{status}: {bound}")));
        }
        assert_eq!(LightStatus::LightDark.bound(), Some(217.0));
        assert_eq!(LightStatus::Blackout.bound(), None);
    }
}
