//! Controller configuration.
//!
//! All settings come from environment variables. Parsing goes through a
//! lookup function so tests do not have to mutate the process environment.

use crate::error::ControllerError;
use crate::workload::DEFAULT_AGENT_IMAGE;
use std::net::SocketAddr;
use std::time::Duration;

/// Delay before re-checking a pool that has not converged yet
pub const DEFAULT_REQUEUE_DELAY: Duration = Duration::from_millis(800);

const DEFAULT_PULL_POLICY: &str = "Always";
const DEFAULT_PROBE_ADDR: &str = "0.0.0.0:8081";
const DEFAULT_CONCURRENCY: u16 = 3;
const PULL_POLICIES: [&str; 3] = ["Always", "IfNotPresent", "Never"];

/// Runtime configuration of the HomeAgent Controller
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Requeue delay while a pool is converging
    pub requeue_delay: Duration,
    /// Container image run by every agent instance
    pub agent_image: String,
    /// Image pull policy of the agent container
    pub image_pull_policy: String,
    /// Listen address of the probe and metrics server
    pub probe_addr: SocketAddr,
    /// Maximum number of concurrent reconciliations
    pub concurrency: u16,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let requeue_delay = match lookup("REQUEUE_DELAY_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| {
                    ControllerError::InvalidConfig(format!("REQUEUE_DELAY_MS={:?}: {}", raw, e))
                })?,
            None => DEFAULT_REQUEUE_DELAY,
        };

        let agent_image = lookup("AGENT_IMAGE").unwrap_or_else(|| DEFAULT_AGENT_IMAGE.to_string());
        if agent_image.trim().is_empty() {
            return Err(ControllerError::InvalidConfig(
                "AGENT_IMAGE must not be empty".to_string(),
            ));
        }

        let image_pull_policy =
            lookup("IMAGE_PULL_POLICY").unwrap_or_else(|| DEFAULT_PULL_POLICY.to_string());
        if !PULL_POLICIES.contains(&image_pull_policy.as_str()) {
            return Err(ControllerError::InvalidConfig(format!(
                "IMAGE_PULL_POLICY must be one of {:?}, got {:?}",
                PULL_POLICIES, image_pull_policy
            )));
        }

        let raw_addr = lookup("PROBE_ADDR").unwrap_or_else(|| DEFAULT_PROBE_ADDR.to_string());
        let probe_addr = raw_addr.parse::<SocketAddr>().map_err(|e| {
            ControllerError::InvalidConfig(format!("PROBE_ADDR={:?}: {}", raw_addr, e))
        })?;

        let concurrency = match lookup("RECONCILE_CONCURRENCY") {
            Some(raw) => raw.parse::<u16>().map_err(|e| {
                ControllerError::InvalidConfig(format!("RECONCILE_CONCURRENCY={:?}: {}", raw, e))
            })?,
            None => DEFAULT_CONCURRENCY,
        };

        Ok(Self {
            namespace,
            requeue_delay,
            agent_image,
            image_pull_policy,
            probe_addr,
            concurrency,
        })
    }
}
