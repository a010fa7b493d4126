// ── Domain model ──
//
// Plain data shared by the monitor, the CLI, and anything subscribed to
// the event bus. Nothing here performs I/O.

pub mod reading;
pub mod settings;
pub mod snapshot;
pub mod tunnel;

// ── Re-exports ──────────────────────────────────────────────────────

pub use reading::{ReadError, ReadErrorKind, SensorReading, SourceName};
pub use settings::{BulbState, ControlMode, Settings, UnknownCode};
pub use snapshot::{HealthReport, LIGHT_LEGEND, LightStatus, Snapshot};
pub use tunnel::{TunnelState, TunnelStatus};
