// homewatch-api: Capabilities the monitor borrows from the outside world.
//
// Every external collaborator (sensor helper processes, the GPIO line that
// drives the bulb relay, the document store, the public tunnel client and
// the OS power commands) is an async trait here, with one production
// adapter and, where tests need it, an in-memory stand-in.

pub mod actuator;
pub mod error;
pub mod health;
mod process;
pub mod reader;
pub mod store;
pub mod system;
pub mod tunnel;

pub use actuator::{Actuator, MemoryActuator, PinLevel, SysfsGpio};
pub use error::Error;
pub use health::{DEFAULT_HEALTH_SCRIPT, HealthProbe, ShellHealthProbe};
pub use reader::{ProcessReader, ReaderCommand, SensorReader};
pub use store::{Document, DocumentStore, JsonFileStore, MemoryStore};
pub use system::{ShellSystemControl, SystemAction, SystemControl};
pub use tunnel::{ProcessTunnel, TunnelProvider, TunnelSession, subdomain_of};
