//! `homewatch snapshot`: one full collection, printed. The bulb is not touched.

use chrono::Utc;
use tabled::Tabled;

use homewatch_api::DocumentStore;
use homewatch_config::Config;
use homewatch_core::{Settings, Snapshot, SnapshotContext, documents};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, Painter};
use crate::wiring;

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// Settings as last persisted. Never writes.
async fn stored_settings(store: &dyn DocumentStore) -> Settings {
    match store
        .get(documents::COLLECTION, documents::USER_SETTINGS)
        .await
    {
        Ok(Some(doc)) => serde_json::from_value(doc).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored settings are invalid, showing defaults");
            Settings::default()
        }),
        Ok(None) => Settings::default(),
        Err(e) => {
            tracing::warn!(error = %e, "could not read stored settings");
            Settings::default()
        }
    }
}

pub async fn handle(config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let monitor = config.monitor_config()?;
    let aggregator = wiring::aggregator(config)?;
    let settings = stored_settings(wiring::store(config).as_ref()).await;

    let collection = aggregator.collect(&monitor.full_sources()).await;
    let snapshot = collection.into_snapshot(SnapshotContext {
        light_source: monitor.light_source.clone(),
        bulb_state: settings.bulb_state,
        bulb_control_mode: settings.bulb_control_mode,
        connection_count: 0,
        proxy_status: "not running".into(),
        time: Utc::now(),
        errors: Vec::new(),
    });

    let painter = Painter::new(global.color);
    let rendered = output::render_single(global.output, &snapshot, |s| detail(s, painter));
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn detail(snapshot: &Snapshot, painter: Painter) -> String {
    let rows: Vec<ReadingRow> = snapshot
        .readings
        .iter()
        .map(|(name, reading)| ReadingRow {
            source: name.to_string(),
            value: reading.value.map_or_else(|| "-".into(), |v| v.to_string()),
            status: painter.status(reading.success, if reading.success { "ok" } else { "failed" }),
            error: reading
                .error
                .as_ref()
                .map_or_else(String::new, ToString::to_string),
        })
        .collect();

    let light = snapshot
        .photoresistor_status
        .map_or_else(|| painter.dim("unknown"), |s| s.to_string());

    let mut out = output::render_table(&rows);
    out.push_str(&format!(
        "\nLight:  {light} ({})\nBulb:   {} ({} mode)\nHealth: {}\n",
        painter.dim(&snapshot.photoresistor_legend),
        snapshot.bulb_state,
        snapshot.bulb_control_mode,
        painter.status(snapshot.health.success, if snapshot.health.success { "ok" } else { "failed" }),
    ));
    if let Some(text) = snapshot.health.text.as_deref().filter(|t| !t.trim().is_empty()) {
        out.push_str(&painter.dim(text.trim_end()));
        out.push('\n');
    }
    if snapshot.success {
        out.push_str(&painter.good("All sources healthy"));
    } else {
        out.push_str(&painter.bad(&format!("{} problem(s):", snapshot.errors.len())));
        for error in &snapshot.errors {
            out.push_str(&format!("\n  - {error}"));
        }
    }
    out
}
