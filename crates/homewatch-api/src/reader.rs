//! Sensor helper processes.
//!
//! Each logical source (e.g. `thermistor`, `photoresistor`) maps to an
//! external program that prints a single reading on stdout. The reader only
//! captures text; parsing and timeouts belong to the caller.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::process::run_captured;

/// Produces raw text output for a logical sensor source.
#[async_trait]
pub trait SensorReader: Send + Sync {
    /// Invoke the helper for `source` and return everything it printed.
    async fn read_raw(&self, source: &str) -> Result<String, Error>;
}

/// The program and arguments that produce one source's reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ReaderCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Runs one configured helper process per source.
#[derive(Debug, Clone, Default)]
pub struct ProcessReader {
    commands: BTreeMap<String, ReaderCommand>,
}

impl ProcessReader {
    pub fn new(commands: BTreeMap<String, ReaderCommand>) -> Self {
        Self { commands }
    }

    /// Names of every configured source.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }
}

#[async_trait]
impl SensorReader for ProcessReader {
    async fn read_raw(&self, source: &str) -> Result<String, Error> {
        let command = self
            .commands
            .get(source)
            .ok_or_else(|| Error::UnknownSource(source.to_owned()))?;
        run_captured(&command.program, &command.args).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn reader() -> ProcessReader {
        let mut commands = BTreeMap::new();
        commands.insert(
            "photoresistor".to_owned(),
            ReaderCommand::new("sh", ["-c", "echo 150"]),
        );
        commands.insert("silent".to_owned(), ReaderCommand::new("true", Vec::<String>::new()));
        ProcessReader::new(commands)
    }

    #[tokio::test]
    async fn reads_configured_source() {
        let raw = reader().read_raw("photoresistor").await.unwrap();
        assert_eq!(raw.trim(), "150");
    }

    #[tokio::test]
    async fn unknown_source_is_rejected() {
        let err = reader().read_raw("hygrometer").await.unwrap_err();
        assert!(matches!(err, Error::UnknownSource(ref s) if s == "hygrometer"));
    }

    #[tokio::test]
    async fn silent_helper_reports_no_data() {
        let err = reader().read_raw("silent").await.unwrap_err();
        assert!(matches!(err, Error::NoData { .. }));
    }

    #[test]
    fn lists_sources_in_name_order() {
        let r = reader();
        let names: Vec<&str> = r.sources().collect();
        assert_eq!(names, ["photoresistor", "silent"]);
    }

    #[test]
    fn reader_command_args_default_to_empty() {
        let cmd: ReaderCommand = serde_json::from_str(r#"{"program":"python3"}"#).unwrap();
        assert!(cmd.args.is_empty());
    }
}
