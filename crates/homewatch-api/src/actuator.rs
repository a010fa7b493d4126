//! Digital output lines.
//!
//! The bulb is switched through an optocoupler on a single GPIO pin.
//! Every write is followed by a read so callers always learn the level the
//! pin actually settled at.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Error;

/// Logic level of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    /// The sysfs text for this level.
    pub fn as_sysfs(self) -> &'static str {
        match self {
            Self::Low => "0",
            Self::High => "1",
        }
    }

    /// Parse the contents of a sysfs `value` file.
    pub fn from_sysfs(raw: &str) -> Option<Self> {
        match raw.trim() {
            "0" => Some(Self::Low),
            "1" => Some(Self::High),
            _ => None,
        }
    }
}

/// Write-then-read-back access to an output pin.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Drive `pin` to `level`, then read the pin and return what it reports.
    async fn set_output(&self, pin: u32, level: PinLevel) -> Result<PinLevel, Error>;
}

// ── sysfs GPIO ───────────────────────────────────────────────────────

/// GPIO access through the legacy `/sys/class/gpio` interface.
///
/// Pins are exported and switched to `out` lazily on first use.
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    prepared: Mutex<HashSet<u32>>,
}

impl SysfsGpio {
    pub const DEFAULT_ROOT: &'static str = "/sys/class/gpio";

    pub fn new() -> Self {
        Self::with_root(Self::DEFAULT_ROOT)
    }

    /// Use a different sysfs root (tests, chroots).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prepared: Mutex::new(HashSet::new()),
        }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    async fn prepare(&self, pin: u32) -> Result<(), Error> {
        let mut prepared = self.prepared.lock().await;
        if prepared.contains(&pin) {
            return Ok(());
        }

        let dir = self.pin_dir(pin);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tracing::debug!(pin, "exporting GPIO pin");
            tokio::fs::write(self.root.join("export"), pin.to_string())
                .await
                .map_err(|e| gpio_error(pin, "export", &e))?;
        }

        tokio::fs::write(dir.join("direction"), "out")
            .await
            .map_err(|e| gpio_error(pin, "set direction", &e))?;

        prepared.insert(pin);
        Ok(())
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Actuator for SysfsGpio {
    async fn set_output(&self, pin: u32, level: PinLevel) -> Result<PinLevel, Error> {
        self.prepare(pin).await?;

        let value_path = self.pin_dir(pin).join("value");
        tokio::fs::write(&value_path, level.as_sysfs())
            .await
            .map_err(|e| gpio_error(pin, "write", &e))?;

        let raw = tokio::fs::read_to_string(&value_path)
            .await
            .map_err(|e| gpio_error(pin, "read back", &e))?;

        PinLevel::from_sysfs(&raw).ok_or_else(|| Error::Gpio {
            pin,
            reason: format!("unexpected value {:?}", raw.trim()),
        })
    }
}

fn gpio_error(pin: u32, op: &str, err: &std::io::Error) -> Error {
    Error::Gpio {
        pin,
        reason: format!("{op} failed: {err}"),
    }
}

// ── In-memory pin ────────────────────────────────────────────────────

/// An output that lives in memory. Used for dry runs and tests.
///
/// [`stick_at`](Self::stick_at) makes the read-back ignore writes, which
/// simulates a relay that does not follow its input.
#[derive(Debug)]
pub struct MemoryActuator {
    state: Mutex<MemoryPin>,
}

#[derive(Debug)]
struct MemoryPin {
    level: PinLevel,
    stuck: Option<PinLevel>,
    writes: usize,
}

impl MemoryActuator {
    pub fn new(initial: PinLevel) -> Self {
        Self {
            state: Mutex::new(MemoryPin {
                level: initial,
                stuck: None,
                writes: 0,
            }),
        }
    }

    /// Force every subsequent read-back to report `level`.
    pub async fn stick_at(&self, level: PinLevel) {
        self.state.lock().await.stuck = Some(level);
    }

    /// The level most recently written.
    pub async fn level(&self) -> PinLevel {
        self.state.lock().await.level
    }

    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }
}

impl Default for MemoryActuator {
    fn default() -> Self {
        Self::new(PinLevel::Low)
    }
}

#[async_trait]
impl Actuator for MemoryActuator {
    async fn set_output(&self, _pin: u32, level: PinLevel) -> Result<PinLevel, Error> {
        let mut pin = self.state.lock().await;
        pin.level = level;
        pin.writes += 1;
        Ok(pin.stuck.unwrap_or(level))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sysfs_writes_direction_and_value() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("gpio16")).unwrap();
        let gpio = SysfsGpio::with_root(root.path());

        let level = gpio.set_output(16, PinLevel::High).await.unwrap();
        assert_eq!(level, PinLevel::High);

        let direction = std::fs::read_to_string(root.path().join("gpio16/direction")).unwrap();
        assert_eq!(direction, "out");
        let value = std::fs::read_to_string(root.path().join("gpio16/value")).unwrap();
        assert_eq!(value, "1");

        assert_eq!(gpio.set_output(16, PinLevel::Low).await.unwrap(), PinLevel::Low);
    }

    #[tokio::test]
    async fn sysfs_requests_export_for_unknown_pin() {
        let root = tempfile::tempdir().unwrap();
        let gpio = SysfsGpio::with_root(root.path());

        // Nothing creates gpio20/ here, so preparing the pin fails after export.
        let err = gpio.set_output(20, PinLevel::High).await.unwrap_err();
        assert!(matches!(err, Error::Gpio { pin: 20, .. }), "got {err:?}");

        let export = std::fs::read_to_string(root.path().join("export")).unwrap();
        assert_eq!(export, "20");
    }

    #[tokio::test]
    async fn memory_actuator_follows_writes() {
        let pin = MemoryActuator::default();
        assert_eq!(pin.set_output(16, PinLevel::High).await.unwrap(), PinLevel::High);
        assert_eq!(pin.level().await, PinLevel::High);
        assert_eq!(pin.write_count().await, 1);
    }

    #[tokio::test]
    async fn stuck_memory_actuator_reports_stuck_level() {
        let pin = MemoryActuator::default();
        pin.stick_at(PinLevel::Low).await;
        assert_eq!(pin.set_output(16, PinLevel::High).await.unwrap(), PinLevel::Low);
    }

    #[test]
    fn parses_sysfs_values() {
        assert_eq!(PinLevel::from_sysfs("1\n"), Some(PinLevel::High));
        assert_eq!(PinLevel::from_sysfs("0"), Some(PinLevel::Low));
        assert_eq!(PinLevel::from_sysfs("x"), None);
    }
}
