//! Host power control.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::process::run_status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SystemAction {
    Reboot,
    Shutdown,
}

/// Reboots or powers off the host.
#[async_trait]
pub trait SystemControl: Send + Sync {
    async fn perform(&self, action: SystemAction) -> Result<(), Error>;
}

/// Runs a configured command line for each action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSystemControl {
    reboot: Vec<String>,
    shutdown: Vec<String>,
}

impl ShellSystemControl {
    pub fn new(reboot: Vec<String>, shutdown: Vec<String>) -> Self {
        Self { reboot, shutdown }
    }

    fn argv(&self, action: SystemAction) -> &[String] {
        match action {
            SystemAction::Reboot => &self.reboot,
            SystemAction::Shutdown => &self.shutdown,
        }
    }
}

impl Default for ShellSystemControl {
    fn default() -> Self {
        let words = |s: &str| -> Vec<String> { s.split_whitespace().map(str::to_owned).collect() };
        Self::new(words("sudo reboot"), words("sudo shutdown -h now"))
    }
}

#[async_trait]
impl SystemControl for ShellSystemControl {
    async fn perform(&self, action: SystemAction) -> Result<(), Error> {
        tracing::warn!(%action, "executing host power action");
        run_status(self.argv(action)).await
    }
}
