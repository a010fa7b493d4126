// ── Persisted settings ──
//
// The stored document keeps the numeric codes clients already understand:
// `bulbControlMode` 1 = sensor, 2 = manual; `bulbState` 0 = off, 1 = on.

use homewatch_api::PinLevel;
use serde::{Deserialize, Serialize};

/// A numeric code that maps to no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} code {code}")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub code: u8,
}

// ── ControlMode ─────────────────────────────────────────────────────

/// Who decides the bulb state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(into = "u8", try_from = "u8")]
#[strum(ascii_case_insensitive)]
pub enum ControlMode {
    /// The light sensor and the clock drive the bulb.
    #[default]
    #[strum(to_string = "sensor", serialize = "auto", serialize = "automatic")]
    Sensor,
    /// Explicit commands drive the bulb.
    #[strum(to_string = "manual")]
    Manual,
}

impl From<ControlMode> for u8 {
    fn from(mode: ControlMode) -> Self {
        match mode {
            ControlMode::Sensor => 1,
            ControlMode::Manual => 2,
        }
    }
}

impl TryFrom<u8> for ControlMode {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Sensor),
            2 => Ok(Self::Manual),
            _ => Err(UnknownCode {
                kind: "control mode",
                code,
            }),
        }
    }
}

// ── BulbState ───────────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(into = "u8", try_from = "u8")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BulbState {
    #[default]
    Off,
    On,
}

impl BulbState {
    /// Pin level that produces this state.
    pub fn level(self) -> PinLevel {
        match self {
            Self::Off => PinLevel::Low,
            Self::On => PinLevel::High,
        }
    }
}

impl From<PinLevel> for BulbState {
    fn from(level: PinLevel) -> Self {
        match level {
            PinLevel::Low => Self::Off,
            PinLevel::High => Self::On,
        }
    }
}

impl From<BulbState> for u8 {
    fn from(state: BulbState) -> Self {
        match state {
            BulbState::Off => 0,
            BulbState::On => 1,
        }
    }
}

impl TryFrom<u8> for BulbState {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Off),
            1 => Ok(Self::On),
            _ => Err(UnknownCode {
                kind: "bulb state",
                code,
            }),
        }
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// The `user-settings` document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub bulb_control_mode: ControlMode,
    pub bulb_state: BulbState,
}

impl Settings {
    pub fn with_bulb_state(self, bulb_state: BulbState) -> Self {
        Self { bulb_state, ..self }
    }

    pub fn with_mode(self, bulb_control_mode: ControlMode) -> Self {
        Self {
            bulb_control_mode,
            ..self
        }
    }
}
