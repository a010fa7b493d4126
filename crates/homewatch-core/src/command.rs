// ── Command API ──
//
// Every inbound request flows through the `Command` enum, whether it
// arrived as a document write from a client, a JSON line on stdin, or a
// direct call. The monitor's command processor routes each variant.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::model::{BulbState, ControlMode, Settings, Snapshot};

/// Well-known document ids in the store.
pub mod documents {
    /// Collection holding every control and state document.
    pub const COLLECTION: &str = "values";
    /// Collection receiving remote log records.
    pub const LOGS: &str = "logs";

    /// `{ bulbControlMode, bulbState }`, owned by the settings store.
    pub const USER_SETTINGS: &str = "user-settings";
    /// `{ value }` announcing the bulb state the pin reported.
    pub const BULB_STATE_FROM_MACHINE: &str = "bulb-state__from-machine";
    /// The latest on-demand snapshot.
    pub const MACHINE_DATA: &str = "machine-data";

    // Written by clients
    pub const MACHINE_DATA_REQUEST: &str = "machine-data-request";
    pub const CONTROL_MODE_FROM_CLIENT: &str = "bulb-control-mode__from-client";
    pub const BULB_STATE_FROM_CLIENT: &str = "bulb-state__from-client";
    pub const REBOOT_FROM_CLIENT: &str = "reboot__from-client";

    /// Client documents the monitor reacts to.
    pub const INBOUND: [&str; 4] = [
        CONTROL_MODE_FROM_CLIENT,
        BULB_STATE_FROM_CLIENT,
        MACHINE_DATA_REQUEST,
        REBOOT_FROM_CLIENT,
    ];
}

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// Every request the monitor accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// Switch control mode, then re-evaluate the bulb immediately.
    SetControlMode { mode: ControlMode },
    /// Drive the bulb directly. Only honoured in manual mode.
    SetBulbState { state: BulbState },
    /// Run a full cycle now and answer with its snapshot.
    RequestHealthSnapshot,
    Reboot,
    Shutdown,
    /// Stop the monitor.
    Terminate,
}

impl Command {
    /// Translate a client document write into a command.
    ///
    /// Returns `Ok(None)` for documents the monitor does not act on.
    pub fn from_document(id: &str, doc: &Value) -> Result<Option<Self>, CoreError> {
        let command = match id {
            documents::CONTROL_MODE_FROM_CLIENT => {
                let mode = ControlMode::try_from(value_code(id, doc)?).map_err(|e| {
                    CoreError::InvalidDocument {
                        id: id.into(),
                        reason: e.to_string(),
                    }
                })?;
                Self::SetControlMode { mode }
            }
            documents::BULB_STATE_FROM_CLIENT => {
                let state = BulbState::try_from(value_code(id, doc)?).map_err(|e| {
                    CoreError::InvalidDocument {
                        id: id.into(),
                        reason: e.to_string(),
                    }
                })?;
                Self::SetBulbState { state }
            }
            documents::MACHINE_DATA_REQUEST => Self::RequestHealthSnapshot,
            documents::REBOOT_FROM_CLIENT => Self::Reboot,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

/// The numeric `value` field of a client document.
fn value_code(id: &str, doc: &Value) -> Result<u8, CoreError> {
    doc.get("value")
        .and_then(Value::as_u64)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| CoreError::InvalidDocument {
            id: id.into(),
            reason: format!("expected a small integer `value`, got {doc}"),
        })
}

/// What a command produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum CommandResult {
    Ok,
    /// Settings after the command took effect.
    Applied { settings: Settings },
    Snapshot { snapshot: Arc<Snapshot> },
    /// The command was valid but had no effect.
    Ignored { reason: String },
    Terminating,
}
