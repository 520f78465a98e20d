//! HomeAgent Controller
//!
//! Keeps a Deployment of agent instances in step with every `HomeAgent`
//! resource and, once all instances are ready, publishes their pod addresses
//! in the HomeAgent status. The Deployment is removed when its HomeAgent is
//! deleted.

mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod server;
mod watcher;
mod workload;

#[cfg(test)]
mod test_utils;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting HomeAgent Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!(
        "  Namespace: {}",
        config.namespace.as_deref().unwrap_or("all namespaces")
    );
    info!("  Agent image: {} ({})", config.agent_image, config.image_pull_policy);
    info!("  Requeue delay: {:?}", config.requeue_delay);
    info!("  Concurrency: {}", config.concurrency);
    info!("  Probe address: {}", config.probe_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    info!("HomeAgent Controller stopped");
    Ok(())
}
