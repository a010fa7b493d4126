//! Bulb control policy.
//!
//! [`decide`] is a pure function of its inputs. In sensor mode it applies
//! hysteresis over two signals, the hour of day and the light reading:
//!
//! - **Off → On** in the evening window, or when it is dark outside the
//!   pre-dawn window.
//! - **On → Off** in the pre-dawn window, or when it is light outside the
//!   evening window.
//! - Everything else keeps the previous state.
//!
//! A missing light reading leaves only the time-of-day clauses.
//!
//! [`BulbController`] is the only writer of the bulb pin. It always reads
//! the pin back and reports the level the pin actually reached.

use std::sync::Arc;

use homewatch_api::Actuator;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PolicyConfig;
use crate::error::CoreError;
use crate::model::{BulbState, ControlMode};

// ── HourWindow ──────────────────────────────────────────────────────

/// An inclusive range of hours. `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(self, hour: u32) -> bool {
        if self.start <= self.end {
            (self.start..=self.end).contains(&hour)
        } else {
            hour >= self.start || hour <= self.end
        }
    }
}

// ── Decision ────────────────────────────────────────────────────────

/// Next bulb state for the given inputs.
///
/// Manual mode returns `previous` untouched; explicit commands move the
/// bulb in that mode.
pub fn decide(
    light: Option<f64>,
    mode: ControlMode,
    previous: BulbState,
    hour: u32,
    config: &PolicyConfig,
) -> BulbState {
    if mode == ControlMode::Manual {
        return previous;
    }

    let evening = config.evening.contains(hour);
    let pre_dawn = config.pre_dawn.contains(hour);
    let dark = light
        .filter(|l| l.is_finite())
        .map(|l| l >= config.light_dark_threshold);

    match previous {
        BulbState::Off if evening || (dark == Some(true) && !pre_dawn) => BulbState::On,
        BulbState::On if pre_dawn || (dark == Some(false) && !evening) => BulbState::Off,
        unchanged => unchanged,
    }
}

// ── Actuation ───────────────────────────────────────────────────────

/// Outcome of a write-then-read-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Applied {
    pub requested: BulbState,
    /// What the pin reported after the write. This is the state of record.
    pub actual: BulbState,
}

impl Applied {
    pub fn is_mismatch(&self) -> bool {
        self.requested != self.actual
    }
}

/// Drives the bulb pin.
#[derive(Clone)]
pub struct BulbController {
    actuator: Arc<dyn Actuator>,
    pin: u32,
}

impl BulbController {
    pub fn new(actuator: Arc<dyn Actuator>, pin: u32) -> Self {
        Self { actuator, pin }
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub async fn apply_and_read_back(&self, requested: BulbState) -> Result<Applied, CoreError> {
        let level = self
            .actuator
            .set_output(self.pin, requested.level())
            .await
            .map_err(|e| CoreError::Actuator {
                pin: self.pin,
                message: e.to_string(),
            })?;

        let applied = Applied {
            requested,
            actual: BulbState::from(level),
        };
        if applied.is_mismatch() {
            warn!(
                pin = self.pin,
                requested = %applied.requested,
                actual = %applied.actual,
                "bulb pin did not follow the requested state"
            );
        } else {
            debug!(pin = self.pin, state = %applied.actual, "bulb pin set");
        }
        Ok(applied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homewatch_api::{MemoryActuator, PinLevel};

    use super::*;

    const SENSOR: ControlMode = ControlMode::Sensor;
    const DARK: Option<f64> = Some(220.0);
    const LIGHT: Option<f64> = Some(150.0);

    fn decide_at(light: Option<f64>, previous: BulbState, hour: u32) -> BulbState {
        decide(light, SENSOR, previous, hour, &PolicyConfig::default())
    }

    #[test]
    fn windows_are_inclusive() {
        let evening = HourWindow::new(18, 23);
        assert!(evening.contains(18));
        assert!(evening.contains(23));
        assert!(!evening.contains(17));

        let wrapping = HourWindow::new(22, 2);
        assert!(wrapping.contains(23));
        assert!(wrapping.contains(1));
        assert!(!wrapping.contains(12));
    }

    #[test]
    fn evening_turns_bulb_on() {
        assert_eq!(decide_at(LIGHT, BulbState::Off, 19), BulbState::On);
        assert_eq!(decide_at(None, BulbState::Off, 18), BulbState::On);
    }

    #[test]
    fn darkness_turns_bulb_on_outside_pre_dawn() {
        assert_eq!(decide_at(DARK, BulbState::Off, 12), BulbState::On);
        assert_eq!(decide_at(DARK, BulbState::Off, 4), BulbState::Off);
    }

    #[test]
    fn pre_dawn_turns_bulb_off_regardless_of_light() {
        assert_eq!(decide_at(DARK, BulbState::On, 3), BulbState::Off);
        assert_eq!(decide_at(None, BulbState::On, 0), BulbState::Off);
    }

    #[test]
    fn light_turns_bulb_off_outside_evening() {
        assert_eq!(decide_at(LIGHT, BulbState::On, 10), BulbState::Off);
        assert_eq!(decide_at(LIGHT, BulbState::On, 20), BulbState::On);
    }

    #[test]
    fn stays_on_just_above_threshold() {
        assert_eq!(decide_at(Some(217.5), BulbState::On, 10), BulbState::On);
        assert_eq!(decide_at(Some(217.0), BulbState::On, 14), BulbState::On);
    }

    #[test]
    fn missing_light_leaves_daytime_state_alone() {
        assert_eq!(decide_at(None, BulbState::On, 12), BulbState::On);
        assert_eq!(decide_at(None, BulbState::Off, 12), BulbState::Off);
    }

    #[test]
    fn manual_mode_keeps_previous_state() {
        let config = PolicyConfig::default();
        for hour in 0..24 {
            for previous in [BulbState::On, BulbState::Off] {
                assert_eq!(
                    decide(DARK, ControlMode::Manual, previous, hour, &config),
                    previous
                );
            }
        }
    }

    #[test]
    fn decision_is_deterministic() {
        let config = PolicyConfig::default();
        for hour in 0..24 {
            for light in [None, LIGHT, DARK, Some(217.0)] {
                for previous in [BulbState::On, BulbState::Off] {
                    let first = decide(light, SENSOR, previous, hour, &config);
                    let second = decide(light, SENSOR, previous, hour, &config);
                    assert_eq!(first, second);
                }
            }
        }
    }

    #[tokio::test]
    async fn read_back_is_authoritative() {
        let actuator = Arc::new(MemoryActuator::default());
        actuator.stick_at(PinLevel::Low).await;
        let bulb = BulbController::new(actuator.clone(), 16);

        let applied = bulb.apply_and_read_back(BulbState::On).await.unwrap();
        assert_eq!(applied.requested, BulbState::On);
        assert_eq!(applied.actual, BulbState::Off);
        assert!(applied.is_mismatch());
        assert_eq!(actuator.level().await, PinLevel::High);
    }
}
