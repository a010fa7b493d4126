//! Owner of the persisted [`Settings`] record.
//!
//! Every mutation of the bulb state or control mode goes through
//! [`SettingsStore`]. The in-memory copy is the state of record: a failed
//! write is logged and left for the next call to retry, never rolled back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use homewatch_api::DocumentStore;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::command::documents;
use crate::error::CoreError;
use crate::events::{EventBus, MonitorEvent};
use crate::model::{BulbState, ControlMode, Settings};

/// What happened to the backing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing to write.
    Skipped,
    Written,
    Failed(String),
}

/// Result of [`SettingsStore::apply_if_changed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub changed: bool,
    pub write: WriteOutcome,
}

impl ApplyOutcome {
    pub fn persisted(&self) -> bool {
        self.write == WriteOutcome::Written
    }
}

pub struct SettingsStore {
    store: Arc<dyn DocumentStore>,
    events: EventBus,
    current: ArcSwap<Settings>,
    /// Set when the last write failed; the next call writes even without a change.
    dirty: AtomicBool,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Load `user-settings`, writing defaults back when the document is missing.
    pub async fn load(store: Arc<dyn DocumentStore>, events: EventBus) -> Result<Self, CoreError> {
        let loaded = store
            .get(documents::COLLECTION, documents::USER_SETTINGS)
            .await?;

        let (settings, dirty) = match loaded {
            Some(doc) => {
                let settings: Settings =
                    serde_json::from_value(doc).map_err(|e| CoreError::InvalidDocument {
                        id: documents::USER_SETTINGS.into(),
                        reason: e.to_string(),
                    })?;
                debug!(?settings, "loaded settings");
                (settings, false)
            }
            None => {
                info!("no stored settings, starting from defaults");
                (Settings::default(), true)
            }
        };

        let this = Self {
            store,
            events,
            current: ArcSwap::from_pointee(settings),
            dirty: AtomicBool::new(dirty),
            write_lock: Mutex::new(()),
        };

        if dirty {
            this.persist(settings, false).await;
        }
        Ok(this)
    }

    /// The current settings.
    pub fn current(&self) -> Settings {
        **self.current.load()
    }

    /// Adopt `next` if it differs from the current record.
    ///
    /// On a change the record is written, and a bulb change is announced
    /// on the event bus after the write. An unchanged record is a no-op
    /// unless an earlier write failed.
    pub async fn apply_if_changed(&self, next: Settings) -> ApplyOutcome {
        let _guard = self.write_lock.lock().await;
        let previous = self.current();

        if next == previous {
            if !self.dirty.load(Ordering::SeqCst) {
                return ApplyOutcome {
                    changed: false,
                    write: WriteOutcome::Skipped,
                };
            }
            debug!("retrying settings write");
            return ApplyOutcome {
                changed: false,
                write: self.persist(next, true).await,
            };
        }

        self.current.store(Arc::new(next));
        let bulb_changed = next.bulb_state != previous.bulb_state;
        let write = self.persist(next, bulb_changed).await;

        if bulb_changed {
            info!(from = %previous.bulb_state, to = %next.bulb_state, "bulb state changed");
            self.events.publish(MonitorEvent::BulbStateChanged {
                state: next.bulb_state,
            });
        }

        ApplyOutcome {
            changed: true,
            write,
        }
    }

    /// Record a new bulb state, keeping the mode.
    pub async fn apply_bulb_state(&self, state: BulbState) -> ApplyOutcome {
        self.apply_if_changed(self.current().with_bulb_state(state))
            .await
    }

    /// Switch control mode. The record is written even if the mode is unchanged.
    pub async fn set_mode(&self, mode: ControlMode) -> ApplyOutcome {
        let _guard = self.write_lock.lock().await;
        let previous = self.current();
        let next = previous.with_mode(mode);
        self.current.store(Arc::new(next));
        if mode != previous.bulb_control_mode {
            info!(from = %previous.bulb_control_mode, to = %mode, "control mode changed");
        }
        ApplyOutcome {
            changed: next != previous,
            write: self.persist(next, false).await,
        }
    }

    async fn persist(&self, settings: Settings, mirror_bulb: bool) -> WriteOutcome {
        match self.write(settings, mirror_bulb).await {
            Ok(()) => {
                self.dirty.store(false, Ordering::SeqCst);
                WriteOutcome::Written
            }
            Err(e) => {
                warn!(error = %e, "settings write failed, keeping in-memory state");
                self.dirty.store(true, Ordering::SeqCst);
                WriteOutcome::Failed(e.to_string())
            }
        }
    }

    async fn write(&self, settings: Settings, mirror_bulb: bool) -> Result<(), CoreError> {
        let doc = serde_json::to_value(settings)
            .map_err(|e| CoreError::Internal(format!("encoding settings: {e}")))?;
        self.store
            .put(documents::COLLECTION, documents::USER_SETTINGS, doc)
            .await?;

        if mirror_bulb {
            let code = u8::from(settings.bulb_state);
            self.store
                .put(
                    documents::COLLECTION,
                    documents::BULB_STATE_FROM_MACHINE,
                    json!({ "value": code }),
                )
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homewatch_api::MemoryStore;
    use pretty_assertions::assert_eq;

    use super::*;

    async fn fresh() -> (Arc<MemoryStore>, EventBus, SettingsStore) {
        let store = MemoryStore::shared();
        let events = EventBus::new();
        let settings = SettingsStore::load(store.clone(), events.clone())
            .await
            .unwrap();
        (store, events, settings)
    }

    #[tokio::test]
    async fn missing_document_is_created_with_defaults() {
        let (store, _, settings) = fresh().await;
        assert_eq!(settings.current(), Settings::default());
        assert_eq!(
            store
                .get(documents::COLLECTION, documents::USER_SETTINGS)
                .await
                .unwrap(),
            Some(json!({"bulbControlMode": 1, "bulbState": 0}))
        );
    }

    #[tokio::test]
    async fn loads_existing_document() {
        let store = MemoryStore::shared();
        store
            .put(
                documents::COLLECTION,
                documents::USER_SETTINGS,
                json!({"bulbControlMode": 2, "bulbState": 1}),
            )
            .await
            .unwrap();

        let settings = SettingsStore::load(store.clone(), EventBus::new())
            .await
            .unwrap();
        assert_eq!(settings.current().bulb_control_mode, ControlMode::Manual);
        assert_eq!(settings.current().bulb_state, BulbState::On);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn invalid_document_fails_load() {
        let store = MemoryStore::shared();
        store
            .put(
                documents::COLLECTION,
                documents::USER_SETTINGS,
                json!({"bulbControlMode": 9}),
            )
            .await
            .unwrap();
        let err = SettingsStore::load(store, EventBus::new()).await.err().unwrap();
        assert!(matches!(err, CoreError::InvalidDocument { .. }));
    }

    #[tokio::test]
    async fn repeated_apply_writes_and_notifies_once() {
        let (store, events, settings) = fresh().await;
        let mut rx = events.subscribe();
        let baseline = store.put_count();

        let first = settings.apply_bulb_state(BulbState::On).await;
        let second = settings.apply_bulb_state(BulbState::On).await;

        assert!(first.changed && first.persisted());
        assert_eq!(
            second,
            ApplyOutcome {
                changed: false,
                write: WriteOutcome::Skipped
            }
        );
        // user-settings plus the bulb-state mirror
        assert_eq!(store.put_count(), baseline + 2);

        assert!(matches!(
            rx.try_recv().unwrap(),
            MonitorEvent::BulbStateChanged {
                state: BulbState::On
            }
        ));
        assert!(rx.try_recv().is_err());

        assert_eq!(
            store
                .get(documents::COLLECTION, documents::BULB_STATE_FROM_MACHINE)
                .await
                .unwrap(),
            Some(json!({"value": 1}))
        );
    }

    #[tokio::test]
    async fn failed_write_keeps_memory_and_retries() {
        let (store, _, settings) = fresh().await;
        store.fail_writes(true);

        let outcome = settings.apply_bulb_state(BulbState::On).await;
        assert!(outcome.changed);
        assert!(matches!(outcome.write, WriteOutcome::Failed(_)));
        assert_eq!(settings.current().bulb_state, BulbState::On);

        store.fail_writes(false);
        let retry = settings.apply_bulb_state(BulbState::On).await;
        assert!(!retry.changed);
        assert!(retry.persisted());

        let again = settings.apply_bulb_state(BulbState::On).await;
        assert_eq!(again.write, WriteOutcome::Skipped);
    }

    #[tokio::test]
    async fn mode_change_always_persists() {
        let (store, events, settings) = fresh().await;
        let mut rx = events.subscribe();
        let baseline = store.put_count();

        assert!(settings.set_mode(ControlMode::Manual).await.changed);
        assert!(!settings.set_mode(ControlMode::Manual).await.changed);
        assert_eq!(store.put_count(), baseline + 2);
        assert!(rx.try_recv().is_err());
    }
}
