//! `homewatch config`: inspect the effective configuration.

use homewatch_config::{config_path, load_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let config = load_config(global.config.as_deref())?;
            let rendered = match global.output {
                OutputFormat::Table => config.to_toml()?,
                format => output::render_single(format, &config, |_| String::new()),
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = global.config.clone().unwrap_or_else(config_path);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }
    }
}
