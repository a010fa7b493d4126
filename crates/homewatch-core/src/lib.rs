//! Monitoring and actuation loop for a single-board home controller.
//!
//! This crate owns the domain logic of homewatch. Every outside
//! collaborator (sensor helpers, GPIO, document store, tunnel client, host
//! power control) is reached through the capability traits of
//! `homewatch-api`, so the whole loop runs against in-memory fakes in tests.
//!
//! - **[`Monitor`]**: cheaply cloneable facade. [`start()`](Monitor::start)
//!   spawns the periodic scheduler, the command processor, the inbound
//!   document bridge, and the tunnel status forwarder.
//!
//! - **[`Aggregator`]**: fans out one reader per source plus the health probe
//!   and waits for every one of them to settle.
//!
//! - **[`policy`]**: the pure hysteresis decision and the
//!   [`BulbController`] that writes the pin and reads it back.
//!
//! - **[`SettingsStore`]**: sole owner of the persisted [`Settings`] record.
//!   Writes only on change and announces bulb changes on the [`EventBus`].
//!
//! - **[`TunnelManager`]**: supervises the public tunnel with subdomain
//!   negotiation, cooldown, and backoff.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod monitor;
pub mod persistence;
pub mod policy;
pub mod reader;
pub mod remote_log;
pub mod scheduler;
pub mod tunnel;

// ── Primary re-exports ──────────────────────────────────────────────
pub use aggregate::{Aggregator, Collection, SnapshotContext};
pub use clock::{Clock, FixedClock, SystemClock};
pub use command::{Command, CommandResult, documents};
pub use config::{MonitorConfig, PolicyConfig, TunnelConfig};
pub use error::CoreError;
pub use events::{EventBus, MonitorEvent};
pub use monitor::{Monitor, MonitorDeps, TickReport};
pub use persistence::{ApplyOutcome, SettingsStore, WriteOutcome};
pub use policy::{Applied, BulbController, HourWindow, decide};
pub use reader::{ReaderAdapter, parse_reading};
pub use remote_log::{LogRecord, RemoteLog, Severity};
pub use scheduler::{TickGate, TickKind, run_periodic};
pub use tunnel::TunnelManager;

pub use model::{
    BulbState, ControlMode, HealthReport, LightStatus, ReadError, ReadErrorKind, SensorReading,
    Settings, Snapshot, SourceName, TunnelState, TunnelStatus,
};
