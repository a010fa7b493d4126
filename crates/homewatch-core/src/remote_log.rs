// ── Remote log sink ──
//
// Anomalies worth a human's attention (stuck relay, failed writes, power
// commands) are appended to the `logs` collection so they are visible from
// the store, not only in the local log file.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use homewatch_api::DocumentStore;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::command::documents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One entry in the `logs` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub pid: u32,
}

#[derive(Clone)]
pub struct RemoteLog {
    store: Arc<dyn DocumentStore>,
}

impl RemoteLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append a record. Failures are logged locally and otherwise ignored.
    pub async fn record(&self, severity: Severity, message: impl Into<String>, at: DateTime<Utc>) {
        let record = LogRecord {
            message: message.into(),
            severity,
            timestamp: at,
            pid: std::process::id(),
        };

        let doc = match serde_json::to_value(&record) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "failed to encode remote log record");
                return;
            }
        };

        if let Err(e) = self.store.append(documents::LOGS, doc).await {
            warn!(error = %e, message = %record.message, "failed to append remote log record");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homewatch_api::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn appends_structured_records() {
        let store = MemoryStore::shared();
        let log = RemoteLog::new(store.clone());

        log.record(Severity::Warning, "relay stuck", Utc::now()).await;

        let docs = store.documents(documents::LOGS);
        assert_eq!(docs.len(), 1);
        let record: LogRecord = serde_json::from_value(docs[0].clone()).unwrap();
        assert_eq!(record.message, "relay stuck");
        assert_eq!(record.severity, Severity::Warning);
        assert_eq!(record.pid, std::process::id());
    }

    #[tokio::test]
    async fn store_failures_are_swallowed() {
        let store = MemoryStore::shared();
        store.fail_writes(true);
        RemoteLog::new(store.clone())
            .record(Severity::Error, "boom", Utc::now())
            .await;
        assert!(store.documents(documents::LOGS).is_empty());
    }
}
