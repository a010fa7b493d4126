// ── Fan-out aggregation ──
//
// One reader per source plus the health probe run concurrently, and the
// aggregator waits for every one of them to settle. A failed source is
// recorded, never propagated.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use homewatch_api::HealthProbe;
use indexmap::IndexMap;
use tracing::debug;

use crate::model::{
    BulbState, ControlMode, HealthReport, LIGHT_LEGEND, LightStatus, SensorReading, Snapshot,
    SourceName,
};
use crate::reader::ReaderAdapter;

/// Raw outcome of a fan-out, before the policy has run.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub readings: IndexMap<SourceName, SensorReading>,
    pub health: HealthReport,
}

/// The parts of a snapshot that come from outside the fan-out.
#[derive(Debug, Clone)]
pub struct SnapshotContext {
    pub light_source: SourceName,
    pub bulb_state: BulbState,
    pub bulb_control_mode: ControlMode,
    pub connection_count: usize,
    pub proxy_status: String,
    pub time: DateTime<Utc>,
    /// Anomalies from later in the cycle (actuator, persistence).
    pub errors: Vec<String>,
}

impl Collection {
    pub fn value_of(&self, source: &str) -> Option<f64> {
        self.readings.get(source).and_then(|r| r.value)
    }

    /// Finish the snapshot. `success` is true only when nothing failed.
    pub fn into_snapshot(self, ctx: SnapshotContext) -> Snapshot {
        let mut errors: Vec<String> = self
            .readings
            .iter()
            .filter_map(|(name, reading)| reading.error.as_ref().map(|e| format!("{name}: {e}")))
            .collect();
        if let Some(e) = &self.health.error {
            errors.push(format!("health: {e}"));
        }
        errors.extend(ctx.errors);

        let photoresistor_status = self.value_of(ctx.light_source.as_str()).map(LightStatus::classify);

        Snapshot {
            readings: self.readings,
            health: self.health,
            photoresistor_status,
            photoresistor_legend: LIGHT_LEGEND.to_owned(),
            bulb_state: ctx.bulb_state,
            bulb_control_mode: ctx.bulb_control_mode,
            connection_count: ctx.connection_count,
            proxy_status: ctx.proxy_status,
            time: ctx.time,
            pid: std::process::id(),
            success: errors.is_empty(),
            errors,
        }
    }
}

#[derive(Clone)]
pub struct Aggregator {
    adapter: ReaderAdapter,
    health: Arc<dyn HealthProbe>,
    health_timeout: Duration,
}

impl Aggregator {
    pub fn new(adapter: ReaderAdapter, health: Arc<dyn HealthProbe>, health_timeout: Duration) -> Self {
        Self {
            adapter,
            health,
            health_timeout,
        }
    }

    /// Read every source and capture health, concurrently.
    ///
    /// Returns one entry per distinct source, in the order given.
    pub async fn collect(&self, sources: &[SourceName]) -> Collection {
        let reads = join_all(sources.iter().map(|source| async move {
            (source.clone(), self.read_one(source).await)
        }));

        let (readings, health) = tokio::join!(reads, self.capture_health());

        let readings: IndexMap<_, _> = readings.into_iter().collect();
        debug!(
            sources = readings.len(),
            failed = readings.values().filter(|r| !r.success).count(),
            health = health.success,
            "collection settled"
        );
        Collection { readings, health }
    }

    /// Read a single source.
    pub async fn read_one(&self, source: &SourceName) -> SensorReading {
        SensorReading::from(self.adapter.read(source).await)
    }

    async fn capture_health(&self) -> HealthReport {
        match tokio::time::timeout(self.health_timeout, self.health.capture()).await {
            Ok(Ok(text)) => HealthReport::ok(text),
            Ok(Err(e)) => HealthReport::failed(e.to_string()),
            Err(_) => HealthReport::failed(format!(
                "health probe timed out after {}s",
                self.health_timeout.as_secs_f64()
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use homewatch_api::SensorReader;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::ReadErrorKind;

    struct Sensors;

    #[async_trait]
    impl SensorReader for Sensors {
        async fn read_raw(&self, source: &str) -> Result<String, homewatch_api::Error> {
            match source {
                "photoresistor" => {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Ok("150".into())
                }
                "thermistor" => {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    Ok("21".into())
                }
                "hygrometer" => Ok("wet".into()),
                other => Err(homewatch_api::Error::UnknownSource(other.into())),
            }
        }
    }

    struct Health(bool);

    #[async_trait]
    impl HealthProbe for Health {
        async fn capture(&self) -> Result<String, homewatch_api::Error> {
            if self.0 {
                Ok("===Memory Usage===".into())
            } else {
                Err(homewatch_api::Error::NoData {
                    program: "sh".into(),
                })
            }
        }
    }

    fn aggregator(healthy: bool) -> Aggregator {
        Aggregator::new(
            ReaderAdapter::new(Arc::new(Sensors), Duration::from_secs(10)),
            Arc::new(Health(healthy)),
            Duration::from_secs(15),
        )
    }

    fn names(list: &[&str]) -> Vec<SourceName> {
        list.iter().map(|s| SourceName::from(*s)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn every_source_settles_independently() {
        let sources = names(&["thermistor", "photoresistor", "hygrometer", "missing"]);
        let collection = aggregator(true).collect(&sources).await;

        assert_eq!(collection.readings.len(), 4);
        let order: Vec<&str> = collection.readings.keys().map(SourceName::as_str).collect();
        assert_eq!(order, ["thermistor", "photoresistor", "hygrometer", "missing"]);

        let thermistor = &collection.readings["thermistor"];
        assert!(!thermistor.success);
        assert_eq!(thermistor.error.as_ref().unwrap().kind, ReadErrorKind::Timeout);

        assert_eq!(collection.value_of("photoresistor"), Some(150.0));
        assert_eq!(
            collection.readings["hygrometer"].error.as_ref().unwrap().kind,
            ReadErrorKind::Parse
        );
        assert!(collection.health.success);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_slowest_bounded_by_timeout() {
        let started = tokio::time::Instant::now();
        aggregator(true)
            .collect(&names(&["thermistor", "photoresistor"]))
            .await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(11), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_lists_errors_and_classifies_light() {
        let collection = aggregator(false)
            .collect(&names(&["thermistor", "photoresistor"]))
            .await;

        let snapshot = collection.into_snapshot(SnapshotContext {
            light_source: SourceName::from("photoresistor"),
            bulb_state: BulbState::Off,
            bulb_control_mode: ControlMode::Sensor,
            connection_count: 2,
            proxy_status: "closed".into(),
            time: Utc::now(),
            errors: vec!["actuator: stuck".into()],
        });

        assert!(!snapshot.success);
        assert_eq!(snapshot.errors.len(), 3);
        assert!(snapshot.errors[0].starts_with("thermistor: timeout"));
        assert!(snapshot.errors[1].starts_with("health: "));
        assert_eq!(snapshot.photoresistor_status, Some(LightStatus::Good));
        assert_eq!(snapshot.photoresistor_legend, LIGHT_LEGEND);
        assert_eq!(snapshot.pid, std::process::id());
        assert_eq!(snapshot.connection_count, 2);
    }
}
