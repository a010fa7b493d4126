//! `homewatch decide`: evaluate the bulb policy without touching hardware.

use serde::Serialize;

use homewatch_config::Config;
use homewatch_core::{BulbState, ControlMode, LightStatus, decide};

use crate::cli::{BulbArg, DecideArgs, GlobalOpts, ModeArg};
use crate::error::CliError;
use crate::output::{self, Painter};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Decision {
    mode: String,
    previous: String,
    hour: u32,
    light: Option<f64>,
    light_status: Option<LightStatus>,
    decision: String,
    changed: bool,
}

pub fn handle(args: &DecideArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let policy = config.monitor_config()?.policy;

    let mode = match args.mode {
        ModeArg::Sensor => ControlMode::Sensor,
        ModeArg::Manual => ControlMode::Manual,
    };
    let previous = match args.previous {
        BulbArg::On => BulbState::On,
        BulbArg::Off => BulbState::Off,
    };

    let next = decide(args.light, mode, previous, args.hour, &policy);
    let view = Decision {
        mode: mode.to_string(),
        previous: previous.to_string(),
        hour: args.hour,
        light: args.light,
        light_status: args.light.filter(|l| l.is_finite()).map(LightStatus::classify),
        decision: next.to_string(),
        changed: next != previous,
    };

    let painter = Painter::new(global.color);
    let rendered = output::render_single(global.output, &view, |d| {
        let light = d.light_status.map_or_else(
            || painter.dim("unavailable"),
            |status| format!("{status}"),
        );
        let verdict = if d.changed {
            painter.good(&format!("{} -> {}", d.previous, d.decision))
        } else {
            painter.dim(&format!("stays {}", d.decision))
        };
        format!(
            "mode {}, hour {}, light {light}: {verdict}",
            d.mode, d.hour
        )
    });
    output::print_output(&rendered, global.quiet);
    Ok(())
}
