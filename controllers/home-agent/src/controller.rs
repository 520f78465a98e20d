//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the resource
//! store, the reconciler, the watchers and the probe server together and
//! runs them until one of them stops.

use crate::backoff::ErrorBackoffs;
use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::server::{self, ProbeState};
use crate::watcher::{Context, Watcher};
use crate::workload::WorkloadTemplate;
use kube::Client;
use kube_store::KubeStore;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Error backoff bounds in seconds
const ERROR_BACKOFF_MIN_SECS: u64 = 1;
const ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Main controller for HomeAgent pools.
#[derive(Debug)]
pub struct Controller {
    home_agent_watcher: JoinHandle<Result<(), ControllerError>>,
    deletion_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing HomeAgent Controller");

        let kube_client = Client::try_default().await?;

        let reconciler = Reconciler::new(
            KubeStore::new(kube_client.clone()),
            WorkloadTemplate::new(config.agent_image.clone(), config.image_pull_policy.clone()),
            config.requeue_delay,
        );

        let metrics = Arc::new(Metrics::new()?);
        let ready = Arc::new(AtomicBool::new(false));
        let ctx = Arc::new(Context::new(
            reconciler,
            metrics.clone(),
            ErrorBackoffs::new(ERROR_BACKOFF_MIN_SECS, ERROR_BACKOFF_MAX_SECS),
        ));

        let watcher_instance = Arc::new(Watcher::new(
            ctx,
            kube_client,
            config.namespace.as_deref(),
            config.concurrency,
            ready.clone(),
        ));

        let home_agent_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_home_agents().await })
        };

        let deletion_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_deletions().await })
        };

        let probe_server = {
            let state = ProbeState { ready, metrics };
            let addr = config.probe_addr;
            tokio::spawn(async move { server::serve(addr, state).await })
        };

        info!("HomeAgent Controller initialized");

        Ok(Self {
            home_agent_watcher,
            deletion_watcher,
            probe_server,
        })
    }

    /// Runs the controller until the HomeAgent watcher stops or another
    /// task fails.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Running HomeAgent Controller");

        let result = tokio::select! {
            result = self.home_agent_watcher => {
                info!("HomeAgent watcher finished");
                result
            }
            result = self.deletion_watcher => {
                error!("HomeAgent deletion watcher finished unexpectedly");
                result
            }
            result = self.probe_server => {
                error!("Probe server finished unexpectedly");
                result
            }
        };

        match result {
            Ok(task_result) => task_result,
            Err(e) => Err(ControllerError::Watch(format!("Controller task panicked: {}", e))),
        }
    }
}
