use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use libworker::{
    MemoryConnectionStore, NullBootstrap, NullLockManager, NullSequencer, SupervisorSettings,
    WorkerRegistry,
};
use log::{error, info};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{RwLock, watch};

use crate::config::load_config;
use crate::launcher::TaskLauncher;
use crate::registrar::Registrar;

/// Bring the coordination stack up and run it until ctrl-c.
///
/// SIGHUP re-reads the config file and applies the wake interval to the
/// running supervisors; everything else in the file needs a restart.
pub async fn run(config_path: &Path) -> Result<()> {
    let cfg = load_config(config_path)?;

    let registry = Arc::new(WorkerRegistry::new(cfg.max_workers));
    let store = Arc::new(MemoryConnectionStore::with_rows(cfg.connections.clone()));
    let settings = Arc::new(RwLock::new(SupervisorSettings {
        wake_interval: Duration::from_secs(cfg.wake_interval_secs),
    }));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dbnames: Vec<String> = cfg.databases.iter().map(|db| db.name.clone()).collect();
    registry.preload_supervisors(&dbnames).await?;

    let registrar = Registrar {
        local_sysid: cfg.sysid,
        local_timeline: cfg.timeline,
        databases: cfg.databases.clone(),
        registry: registry.clone(),
        source: store,
        launcher: Arc::new(TaskLauncher::new(registry, shutdown_rx.clone())),
        sequencer: Arc::new(NullSequencer::new()),
        locks: Arc::new(NullLockManager::new()),
        bootstrap: Arc::new(NullBootstrap::new()),
        settings: settings.clone(),
        shutdown: shutdown_rx,
    };
    let registrar_task = tokio::spawn(registrar.run());
    info!("rmrd coordinating {} database(s)", dbnames.len());

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = hangup.recv() => match load_config(config_path) {
                Ok(new_cfg) => {
                    settings.write().await.wake_interval =
                        Duration::from_secs(new_cfg.wake_interval_secs);
                    info!("configuration reloaded");
                }
                Err(err) => error!("configuration reload failed: {err:#}"),
            },
        }
    }

    info!("shutdown requested");
    shutdown_tx.send(true)?;
    registrar_task.await?;
    Ok(())
}
