//! Builds the production collaborators from the loaded config.

use std::sync::Arc;

use tokio::sync::watch;

use homewatch_api::{
    Actuator, DocumentStore, JsonFileStore, MemoryActuator, MemoryStore, ProcessReader,
    ProcessTunnel, ShellHealthProbe, ShellSystemControl, SysfsGpio,
};
use homewatch_config::{Config, GpioBackend, StoreBackend};
use homewatch_core::{
    Aggregator, MonitorDeps, ReaderAdapter, SystemClock, TunnelStatus, documents,
};

use crate::error::CliError;

pub fn reader(config: &Config) -> ProcessReader {
    ProcessReader::new(config.monitor.sources.clone())
}

pub fn health(config: &Config) -> ShellHealthProbe {
    ShellHealthProbe::new(config.health.script.clone())
}

pub fn actuator(config: &Config) -> Arc<dyn Actuator> {
    match config.gpio.backend {
        GpioBackend::Sysfs => Arc::new(SysfsGpio::with_root(config.gpio.sysfs_root.clone())),
        GpioBackend::Memory => Arc::new(MemoryActuator::default()),
    }
}

pub fn store(config: &Config) -> Arc<dyn DocumentStore> {
    match config.store.backend {
        StoreBackend::File => Arc::new(file_store(config)),
        StoreBackend::Memory => MemoryStore::shared(),
    }
}

fn file_store(config: &Config) -> JsonFileStore {
    JsonFileStore::new(config.store.resolved_dir())
        .with_rotation(documents::LOGS, config.store.max_log_records)
}

/// The daemon's store. The file backend also picks up documents written
/// by other processes.
pub async fn watched_store(config: &Config) -> Result<Arc<dyn DocumentStore>, CliError> {
    match config.store.backend {
        StoreBackend::File => {
            let store = Arc::new(file_store(config));
            // Ends on its own once the store is dropped.
            let _watcher = store
                .watch(&[documents::COLLECTION], config.store_poll_interval()?)
                .await?;
            Ok(store)
        }
        StoreBackend::Memory => Ok(MemoryStore::shared()),
    }
}

pub fn system(config: &Config) -> ShellSystemControl {
    ShellSystemControl::new(config.system.reboot.clone(), config.system.shutdown.clone())
}

pub fn tunnel_provider(config: &Config) -> Result<ProcessTunnel, CliError> {
    let (program, args) = config
        .tunnel
        .command
        .split_first()
        .ok_or_else(|| CliError::Validation {
            field: "tunnel.command".into(),
            reason: "must name a program".into(),
        })?;
    Ok(ProcessTunnel::new(
        program.clone(),
        args.to_vec(),
        config.tunnel_startup_timeout()?,
    ))
}

/// Aggregator over the configured helpers, for one-shot commands.
pub fn aggregator(config: &Config) -> Result<Aggregator, CliError> {
    let monitor = config.monitor_config()?;
    Ok(Aggregator::new(
        ReaderAdapter::new(Arc::new(reader(config)), monitor.reader_timeout),
        Arc::new(health(config)),
        monitor.health_timeout,
    ))
}

pub async fn monitor_deps(
    config: &Config,
    tunnel_status: watch::Receiver<TunnelStatus>,
) -> Result<MonitorDeps, CliError> {
    Ok(MonitorDeps {
        reader: Arc::new(reader(config)),
        health: Arc::new(health(config)),
        actuator: actuator(config),
        store: watched_store(config).await?,
        system: Arc::new(system(config)),
        clock: Arc::new(SystemClock),
        tunnel_status,
    })
}
