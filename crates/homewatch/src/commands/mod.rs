//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod config_cmd;
pub mod decide;
pub mod read;
pub mod run;
pub mod snapshot;
pub mod tunnel_check;

use homewatch_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a config-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(args, config, global).await,
        Command::Read(args) => read::handle(args, config, global).await,
        Command::Snapshot => snapshot::handle(config, global).await,
        Command::Decide(args) => decide::handle(&args, config, global),
        Command::TunnelCheck => tunnel_check::handle(config, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
