//! Outbound events.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::{BulbState, Snapshot, TunnelStatus};

const EVENT_CHANNEL_SIZE: usize = 256;

/// Everything the monitor announces to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum MonitorEvent {
    /// A full scheduled tick finished.
    PeriodicData(Arc<Snapshot>),
    /// The bulb state of record changed.
    BulbStateChanged { state: BulbState },
    TunnelStatusChanged(TunnelStatus),
    /// Answer to an on-demand health snapshot request.
    HealthSnapshot(Arc<Snapshot>),
}

/// Broadcast sink for [`MonitorEvent`]s.
///
/// Every live receiver counts as an observer. Scheduled ticks skip the
/// expensive work when nobody is listening.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send to every current observer. Returns how many received it.
    pub fn publish(&self, event: MonitorEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_observers_and_delivers() {
        let bus = EventBus::new();
        assert_eq!(bus.observer_count(), 0);
        assert_eq!(
            bus.publish(MonitorEvent::BulbStateChanged {
                state: BulbState::On
            }),
            0
        );

        let mut rx = bus.subscribe();
        assert_eq!(bus.observer_count(), 1);
        bus.publish(MonitorEvent::BulbStateChanged {
            state: BulbState::Off,
        });
        assert!(matches!(
            rx.recv().await.unwrap(),
            MonitorEvent::BulbStateChanged {
                state: BulbState::Off
            }
        ));

        drop(rx);
        assert_eq!(bus.observer_count(), 0);
    }

    #[test]
    fn serializes_with_event_tag() {
        let json = serde_json::to_value(MonitorEvent::BulbStateChanged {
            state: BulbState::On,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "bulb-state-changed", "data": {"state": 1}})
        );
    }
}
