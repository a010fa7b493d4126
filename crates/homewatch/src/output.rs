//! Output formatting: table, JSON, YAML.
//!
//! Renders data in the format selected by `--output`. Tables use `tabled`,
//! structured formats use serde.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Colors status words when enabled.
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn new(mode: ColorMode) -> Self {
        Self {
            enabled: should_color(mode),
        }
    }

    pub fn good(self, text: &str) -> String {
        if self.enabled {
            text.green().to_string()
        } else {
            text.to_owned()
        }
    }

    pub fn bad(self, text: &str) -> String {
        if self.enabled {
            text.red().bold().to_string()
        } else {
            text.to_owned()
        }
    }

    pub fn dim(self, text: &str) -> String {
        if self.enabled {
            text.dimmed().to_string()
        } else {
            text.to_owned()
        }
    }

    /// `good` or `bad` depending on `ok`.
    pub fn status(self, ok: bool, text: &str) -> String {
        if ok { self.good(text) } else { self.bad(text) }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single item. Table output comes from `detail_fn`.
pub fn render_single<T>(format: OutputFormat, data: &T, detail_fn: impl Fn(&T) -> String) -> String
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Pretty-printed JSON.
pub fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| serialization_failure(&e))
}

/// Compact single-line JSON.
pub fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string(data).unwrap_or_else(|e| serialization_failure(&e))
}

/// YAML output.
pub fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| serialization_failure(&e))
}

fn serialization_failure(e: &dyn std::fmt::Display) -> String {
    tracing::error!(error = %e, "failed to serialize output");
    String::new()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Row {
        source: &'static str,
        value: f64,
    }

    #[test]
    fn structured_formats() {
        let row = Row {
            source: "photoresistor",
            value: 150.0,
        };
        let compact = render_single(OutputFormat::JsonCompact, &row, |_| String::new());
        assert_eq!(compact, r#"{"source":"photoresistor","value":150.0}"#);

        let yaml = render_single(OutputFormat::Yaml, &row, |_| String::new());
        assert!(yaml.contains("source: photoresistor"));

        let table = render_single(OutputFormat::Table, &row, |r| r.source.to_owned());
        assert_eq!(table, "photoresistor");
    }

    #[test]
    fn painter_without_color_is_plain() {
        let painter = Painter::new(ColorMode::Never);
        assert_eq!(painter.status(false, "failed"), "failed");
        assert_eq!(painter.dim("n/a"), "n/a");
    }
}
