//! `homewatch read <source>`: run one sensor helper.

use std::sync::Arc;

use serde::Serialize;

use homewatch_config::Config;
use homewatch_core::{LightStatus, ReaderAdapter, SensorReading, SourceName};

use crate::cli::{GlobalOpts, ReadArgs};
use crate::error::CliError;
use crate::output::{self, Painter};
use crate::wiring;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadView {
    source: SourceName,
    #[serde(flatten)]
    reading: SensorReading,
    #[serde(skip_serializing_if = "Option::is_none")]
    light_status: Option<LightStatus>,
}

pub async fn handle(args: ReadArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let monitor = config.monitor_config()?;
    let adapter = ReaderAdapter::new(Arc::new(wiring::reader(config)), monitor.reader_timeout);
    let source = SourceName::new(args.source);

    let value = adapter
        .read(&source)
        .await
        .map_err(|e| CliError::SourceFailed {
            name: source.to_string(),
            reason: e.to_string(),
        })?;

    let reading = SensorReading::ok(value);
    let light_status = (source == monitor.light_source).then(|| LightStatus::classify(value));
    let view = ReadView {
        source,
        reading,
        light_status,
    };

    let painter = Painter::new(global.color);
    let rendered = output::render_single(global.output, &view, |v| {
        let value = v.reading.value.map_or_else(String::new, |x| x.to_string());
        match v.light_status {
            Some(status) => format!("{}: {value} ({})", v.source, painter.good(&status.to_string())),
            None => format!("{}: {value}", v.source),
        }
    });
    output::print_output(&rendered, global.quiet);
    Ok(())
}
