// ── Monitor facade ──
//
// Full lifecycle management for the monitoring loop. Owns the aggregator,
// the bulb controller, the settings store and the event bus, and spawns
// the background tasks that drive them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use homewatch_api::{
    Actuator, DocumentStore, HealthProbe, SensorReader, SystemAction, SystemControl,
};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregate::{Aggregator, SnapshotContext};
use crate::clock::Clock;
use crate::command::{Command, CommandEnvelope, CommandResult, documents};
use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::events::{EventBus, MonitorEvent};
use crate::model::{ControlMode, Settings, Snapshot, TunnelStatus};
use crate::persistence::{SettingsStore, WriteOutcome};
use crate::policy::{Applied, BulbController, decide};
use crate::reader::ReaderAdapter;
use crate::remote_log::{RemoteLog, Severity};
use crate::scheduler::{TickGate, TickKind, run_periodic};

const COMMAND_CHANNEL_SIZE: usize = 64;

/// External collaborators the monitor drives.
pub struct MonitorDeps {
    pub reader: Arc<dyn SensorReader>,
    pub health: Arc<dyn HealthProbe>,
    pub actuator: Arc<dyn Actuator>,
    pub store: Arc<dyn DocumentStore>,
    pub system: Arc<dyn SystemControl>,
    pub clock: Arc<dyn Clock>,
    /// Status feed of the tunnel supervisor, if one runs.
    pub tunnel_status: watch::Receiver<TunnelStatus>,
}

/// What one cycle did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub kind: TickKind,
    /// The light reading the policy saw, if the read succeeded.
    pub light: Option<f64>,
    /// `None` when the actuator write failed.
    pub applied: Option<Applied>,
    /// Present on full cycles only.
    pub snapshot: Option<Arc<Snapshot>>,
}

struct FullCycle {
    light: Option<f64>,
    applied: Option<Applied>,
    snapshot: Arc<Snapshot>,
}

struct Actuation {
    applied: Option<Applied>,
    anomalies: Vec<String>,
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<MonitorInner>`. Nothing runs until
/// [`start()`](Self::start) is called.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    config: MonitorConfig,
    aggregator: Aggregator,
    bulb: BulbController,
    settings: SettingsStore,
    store: Arc<dyn DocumentStore>,
    system: Arc<dyn SystemControl>,
    clock: Arc<dyn Clock>,
    remote_log: RemoteLog,
    events: EventBus,
    tunnel_status: watch::Receiver<TunnelStatus>,
    gate: TickGate,
    /// Held from the policy decision until the bulb state is recorded, and
    /// by every command that changes settings.
    actuation: Mutex<()>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    running: AtomicBool,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Monitor {
    /// Build a monitor and load the persisted settings.
    pub async fn new(config: MonitorConfig, deps: MonitorDeps) -> Result<Self, CoreError> {
        let events = EventBus::new();
        let settings = SettingsStore::load(Arc::clone(&deps.store), events.clone()).await?;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        let aggregator = Aggregator::new(
            ReaderAdapter::new(deps.reader, config.reader_timeout),
            deps.health,
            config.health_timeout,
        );
        let bulb = BulbController::new(deps.actuator, config.bulb_pin);

        Ok(Self {
            inner: Arc::new(MonitorInner {
                aggregator,
                bulb,
                settings,
                remote_log: RemoteLog::new(Arc::clone(&deps.store)),
                store: deps.store,
                system: deps.system,
                clock: deps.clock,
                events,
                tunnel_status: deps.tunnel_status,
                gate: TickGate::new(),
                actuation: Mutex::new(()),
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                running: AtomicBool::new(false),
                task_handles: Mutex::new(Vec::new()),
                config,
            }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the scheduler, the command processor, the inbound document
    /// bridge and the tunnel status forwarder.
    pub async fn start(&self) {
        let Some(rx) = self.inner.command_rx.lock().await.take() else {
            debug!("monitor already started");
            return;
        };

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(command_processor_task(self.clone(), rx)));

        // Subscribe before spawning so no client write is missed.
        let bridge = subscribe_inbound(self.inner.store.as_ref());
        handles.push(tokio::spawn(document_bridge_task(self.clone(), bridge)));

        handles.push(tokio::spawn(tunnel_forward_task(
            self.inner.tunnel_status.clone(),
            self.inner.events.clone(),
            self.inner.cancel.clone(),
        )));

        let monitor = self.clone();
        let period = self.inner.config.interval;
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(async move {
            run_periodic(period, cancel, || {
                let monitor = monitor.clone();
                async move {
                    monitor.tick().await;
                }
            })
            .await;
        }));

        self.inner.running.store(true, Ordering::SeqCst);
        info!(
            interval_secs = self.inner.config.interval.as_secs(),
            pin = self.inner.bulb.pin(),
            "monitor started"
        );
    }

    /// Cancel every background task and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.running.store(false, Ordering::SeqCst);

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("monitor stopped");
    }

    /// Resolves once the monitor has been told to stop.
    pub async fn stopped(&self) {
        self.inner.cancel.cancelled().await;
    }

    // ── Cycles ───────────────────────────────────────────────────

    /// A scheduled tick. Skipped while another cycle is in flight.
    ///
    /// The amount of work depends on whether anyone is observing.
    pub async fn tick(&self) -> Option<TickReport> {
        let Some(_guard) = self.inner.gate.try_enter() else {
            debug!("cycle in progress, tick coalesced");
            return None;
        };

        let kind = TickKind::for_observers(self.inner.events.observer_count());
        let report = self.cycle(kind).await;

        if let Some(snapshot) = &report.snapshot {
            self.inner
                .events
                .publish(MonitorEvent::PeriodicData(Arc::clone(snapshot)));
        }
        Some(report)
    }

    /// Run a cycle of the given kind, waiting for any cycle in flight.
    pub async fn run_cycle(&self, kind: TickKind) -> TickReport {
        let _guard = self.inner.gate.enter().await;
        self.cycle(kind).await
    }

    /// Full cycle on demand. The snapshot is also written to the
    /// `machine-data` document and published as a health snapshot.
    pub async fn request_health_snapshot(&self) -> Arc<Snapshot> {
        let snapshot = {
            let _guard = self.inner.gate.enter().await;
            self.full_cycle().await.snapshot
        };

        match serde_json::to_value(snapshot.as_ref()) {
            Ok(doc) => {
                if let Err(e) = self
                    .inner
                    .store
                    .put(documents::COLLECTION, documents::MACHINE_DATA, doc)
                    .await
                {
                    warn!(error = %e, "failed to store machine data");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode machine data"),
        }

        self.inner
            .events
            .publish(MonitorEvent::HealthSnapshot(Arc::clone(&snapshot)));
        snapshot
    }

    async fn cycle(&self, kind: TickKind) -> TickReport {
        match kind {
            TickKind::Full => {
                let full = self.full_cycle().await;
                TickReport {
                    kind,
                    light: full.light,
                    applied: full.applied,
                    snapshot: Some(full.snapshot),
                }
            }
            TickKind::Minimal => {
                let light_source = &self.inner.config.light_source;
                let reading = self.inner.aggregator.read_one(light_source).await;
                if let Some(e) = &reading.error {
                    debug!(source = %light_source, error = %e, "light read failed");
                }
                let actuation = self.actuate(reading.value).await;
                TickReport {
                    kind,
                    light: reading.value,
                    applied: actuation.applied,
                    snapshot: None,
                }
            }
        }
    }

    async fn full_cycle(&self) -> FullCycle {
        let inner = &self.inner;
        let collection = inner.aggregator.collect(&inner.config.full_sources()).await;
        let light = collection.value_of(inner.config.light_source.as_str());
        let actuation = self.actuate(light).await;

        let context = self.snapshot_context(inner.settings.current(), actuation.anomalies);
        FullCycle {
            light,
            applied: actuation.applied,
            snapshot: Arc::new(collection.into_snapshot(context)),
        }
    }

    /// Decide from the settings as they are now, drive the pin, record the result.
    ///
    /// Runs under the actuation lock, so a mode switch that lands while the
    /// sensors are being read is honoured here.
    async fn actuate(&self, light: Option<f64>) -> Actuation {
        let inner = &self.inner;
        let _lock = inner.actuation.lock().await;
        let settings = inner.settings.current();
        let hour = inner.clock.hour();

        let mut anomalies = Vec::new();
        let target = decide(
            light,
            settings.bulb_control_mode,
            settings.bulb_state,
            hour,
            &inner.config.policy,
        );

        let applied = match inner.bulb.apply_and_read_back(target).await {
            Ok(applied) => {
                if applied.is_mismatch() {
                    let message = format!(
                        "bulb pin {} reported {} after writing {}",
                        inner.bulb.pin(),
                        applied.actual,
                        applied.requested
                    );
                    self.log_anomaly(Severity::Warning, &message).await;
                    anomalies.push(format!("actuator: {message}"));
                }
                Some(applied)
            }
            Err(e) => {
                error!(error = %e, "bulb actuation failed, keeping previous state");
                self.log_anomaly(Severity::Error, &e.to_string()).await;
                anomalies.push(format!("actuator: {e}"));
                None
            }
        };

        if let Some(applied) = applied {
            let outcome = inner.settings.apply_bulb_state(applied.actual).await;
            if let Some(message) = self.note_write_failure(outcome.write).await {
                anomalies.push(format!("persistence: {message}"));
            }
        }

        debug!(
            ?light,
            hour,
            mode = %settings.bulb_control_mode,
            ?target,
            "bulb evaluated"
        );
        Actuation { applied, anomalies }
    }

    fn snapshot_context(&self, settings: Settings, errors: Vec<String>) -> SnapshotContext {
        SnapshotContext {
            light_source: self.inner.config.light_source.clone(),
            bulb_state: settings.bulb_state,
            bulb_control_mode: settings.bulb_control_mode,
            connection_count: self.inner.events.observer_count(),
            proxy_status: self.inner.tunnel_status.borrow().to_string(),
            time: self.inner.clock.now(),
            errors,
        }
    }

    /// Remote-log a failed settings write. Returns the failure message.
    async fn note_write_failure(&self, write: WriteOutcome) -> Option<String> {
        let WriteOutcome::Failed(message) = write else {
            return None;
        };
        self.log_anomaly(Severity::Error, &format!("settings write failed: {message}"))
            .await;
        Some(message)
    }

    async fn log_anomaly(&self, severity: Severity, message: &str) {
        self.inner
            .remote_log
            .record(severity, message, self.inner.clock.now())
            .await;
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if !self.inner.running.load(Ordering::SeqCst) || self.inner.cancel.is_cancelled() {
            return Err(CoreError::MonitorStopped);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::MonitorStopped)?;

        rx.await.map_err(|_| CoreError::MonitorStopped)?
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to outbound events. Each receiver counts as an observer
    /// until it is dropped.
    pub fn events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn observer_count(&self) -> usize {
        self.inner.events.observer_count()
    }

    pub fn settings(&self) -> Settings {
        self.inner.settings.current()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Process commands from the mpsc channel, one at a time.
async fn command_processor_task(monitor: Monitor, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = monitor.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&monitor, envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

type InboundStreams = StreamMap<&'static str, BroadcastStream<serde_json::Value>>;

fn subscribe_inbound(store: &dyn DocumentStore) -> InboundStreams {
    let mut streams = StreamMap::new();
    for id in documents::INBOUND {
        let rx = store.subscribe(documents::COLLECTION, id);
        streams.insert(id, BroadcastStream::new(rx));
    }
    streams
}

/// Turn client document writes into commands.
async fn document_bridge_task(monitor: Monitor, mut streams: InboundStreams) {
    let cancel = monitor.inner.cancel.clone();

    loop {
        let (id, item) = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = streams.next() => match next {
                Some(next) => next,
                None => break,
            },
        };

        let doc = match item {
            Ok(doc) => doc,
            Err(e) => {
                warn!(id, error = %e, "inbound document stream lagged");
                continue;
            }
        };

        let command = match Command::from_document(id, &doc) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "ignoring inbound document");
                continue;
            }
        };

        debug!(id, ?command, "inbound document");
        match monitor.execute(command).await {
            Ok(result) => debug!(id, ?result, "inbound command handled"),
            Err(CoreError::MonitorStopped) => break,
            Err(e) => warn!(id, error = %e, "inbound command failed"),
        }
    }
}

/// Republish tunnel status transitions on the event bus.
async fn tunnel_forward_task(
    mut rx: watch::Receiver<TunnelStatus>,
    events: EventBus,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = rx.borrow_and_update().clone();
                debug!(%status, "tunnel status changed");
                events.publish(MonitorEvent::TunnelStatusChanged(status));
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

async fn route_command(monitor: &Monitor, cmd: Command) -> Result<CommandResult, CoreError> {
    let inner = &monitor.inner;

    match cmd {
        Command::SetControlMode { mode } => {
            {
                let _lock = inner.actuation.lock().await;
                let outcome = inner.settings.set_mode(mode).await;
                monitor.note_write_failure(outcome.write).await;
            }
            monitor.run_cycle(TickKind::Minimal).await;
            Ok(CommandResult::Applied {
                settings: inner.settings.current(),
            })
        }

        Command::SetBulbState { state } => {
            let _lock = inner.actuation.lock().await;
            if inner.settings.current().bulb_control_mode != ControlMode::Manual {
                return Ok(CommandResult::Ignored {
                    reason: "bulb state can only be set in manual mode".into(),
                });
            }

            let applied = inner.bulb.apply_and_read_back(state).await?;
            if applied.is_mismatch() {
                monitor
                    .log_anomaly(
                        Severity::Warning,
                        &format!(
                            "bulb pin {} reported {} after writing {}",
                            inner.bulb.pin(),
                            applied.actual,
                            applied.requested
                        ),
                    )
                    .await;
            }
            let outcome = inner.settings.apply_bulb_state(applied.actual).await;
            monitor.note_write_failure(outcome.write).await;
            Ok(CommandResult::Applied {
                settings: inner.settings.current(),
            })
        }

        Command::RequestHealthSnapshot => Ok(CommandResult::Snapshot {
            snapshot: monitor.request_health_snapshot().await,
        }),

        Command::Reboot => power(monitor, SystemAction::Reboot).await,
        Command::Shutdown => power(monitor, SystemAction::Shutdown).await,

        Command::Terminate => {
            info!("terminate requested");
            inner.cancel.cancel();
            inner.running.store(false, Ordering::SeqCst);
            Ok(CommandResult::Terminating)
        }
    }
}

async fn power(monitor: &Monitor, action: SystemAction) -> Result<CommandResult, CoreError> {
    monitor
        .log_anomaly(Severity::Info, &format!("{action} requested"))
        .await;
    monitor
        .inner
        .system
        .perform(action)
        .await
        .map_err(|e| CoreError::System {
            message: e.to_string(),
        })?;
    Ok(CommandResult::Ok)
}
