//! Reconciliation logic for HomeAgent CRDs.
//!
//! Each invocation re-reads the HomeAgent, its Deployment and the agent pods
//! and derives the next step from that snapshot alone:
//!
//! 1. HomeAgent gone: delete the Deployment if it is still around
//! 2. Deployment missing: create it, then check back after the requeue delay
//! 3. Replica count diverged from `spec.size`: resize, then check back
//! 4. Not every replica ready, or a pod without an address: check back
//! 5. Otherwise publish the pod addresses in the HomeAgent status
//!
//! A same-named Deployment without the `parent=<name>` label is never
//! adopted: it is neither scaled, reported on, nor deleted.
//!
//! Nothing is remembered between invocations, so duplicate or reordered
//! notifications only cost extra reads.

use crate::error::ControllerError;
use crate::workload::{WorkloadTemplate, is_managed_by, label_selector};
use crds::{HomeAgent, HomeAgentStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube_store::{ObjectKey, ResourceStore, StoreError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Result of a successful reconcile invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged; wait for the next change notification
    Done,
    /// Not converged yet; reconcile again after the delay
    RetryAfter(Duration),
}

/// Reconciles HomeAgent resources.
pub struct Reconciler {
    store: Box<dyn ResourceStore>,
    template: WorkloadTemplate,
    requeue_delay: Duration,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("template", &self.template)
            .field("requeue_delay", &self.requeue_delay)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        store: impl ResourceStore + 'static,
        template: WorkloadTemplate,
        requeue_delay: Duration,
    ) -> Self {
        Self {
            store: Box::new(store),
            template,
            requeue_delay,
        }
    }

    /// Reconciles the HomeAgent identified by `key`.
    ///
    /// Store failures other than "not found" are returned unchanged so the
    /// dispatcher's error backoff applies to them.
    #[instrument(skip(self), fields(home_agent = %key))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ControllerError> {
        debug!("Reconcile started");

        let agent = match self.store.get_home_agent(key).await {
            Ok(agent) => agent,
            Err(StoreError::NotFound(_)) => {
                info!("HomeAgent not found, cleaning up managed Deployment");
                self.cleanup(key).await?;
                return Ok(ReconcileOutcome::Done);
            }
            Err(e) => return Err(e.into()),
        };
        let size = desired_size(&agent)?;

        let deployment = match self.store.get_deployment(key).await {
            Ok(deployment) => deployment,
            Err(StoreError::NotFound(_)) => return self.create_workload(key, &agent, size).await,
            Err(e) => return Err(e.into()),
        };
        if !is_managed_by(&deployment, &key.name) {
            return Err(ControllerError::InvalidResource(format!(
                "Deployment {} exists but is not managed by this HomeAgent",
                key
            )));
        }

        let replicas = deployment.spec.as_ref().and_then(|spec| spec.replicas);
        if replicas != Some(size) {
            info!("Scaling Deployment from {:?} to {} replicas", replicas, size);
            self.store.scale_deployment(key, size).await?;
            return Ok(self.retry());
        }

        let ready = ready_replicas(&deployment);
        if ready < size {
            info!("{}/{} replicas ready, requeueing", ready, size);
            return Ok(self.retry());
        }

        let pods = self
            .store
            .list_pods(&key.namespace, &label_selector(&key.name))
            .await?;
        let Some(addresses) = collect_addresses(pods, size) else {
            info!("Not every instance has an address yet, requeueing");
            return Ok(self.retry());
        };

        let current = agent.status.as_ref().map(|status| &status.node_addresses);
        if current == Some(&addresses) {
            debug!("Status already up-to-date ({} addresses)", addresses.len());
            return Ok(ReconcileOutcome::Done);
        }

        let status = HomeAgentStatus {
            node_addresses: addresses,
        };
        self.store.update_home_agent_status(key, &status).await?;
        info!(
            "Published {} instance addresses: {:?}",
            status.node_addresses.len(),
            status.node_addresses
        );
        Ok(ReconcileOutcome::Done)
    }

    fn retry(&self) -> ReconcileOutcome {
        ReconcileOutcome::RetryAfter(self.requeue_delay)
    }

    async fn create_workload(
        &self,
        key: &ObjectKey,
        agent: &HomeAgent,
        size: i32,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let deployment = self.template.build(agent, size);
        match self.store.create_deployment(key, &deployment).await {
            Ok(()) => info!("Deployment created with {} replicas, requeueing", size),
            // Lost a create race against an overlapping invocation; the
            // Deployment exists either way.
            Err(StoreError::AlreadyExists(_)) => {
                debug!("Deployment already exists, requeueing")
            }
            Err(e) => return Err(e.into()),
        }
        Ok(self.retry())
    }

    /// Deletes the managed Deployment of a HomeAgent that no longer exists.
    async fn cleanup(&self, key: &ObjectKey) -> Result<(), ControllerError> {
        let deployment = match self.store.get_deployment(key).await {
            Ok(deployment) => deployment,
            Err(StoreError::NotFound(_)) => {
                debug!("No Deployment left to clean up");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if !is_managed_by(&deployment, &key.name) {
            warn!("Deployment {} is not managed by this HomeAgent, leaving it", key);
            return Ok(());
        }

        match self.store.delete_deployment(key).await {
            Ok(()) => {
                info!("Deleted Deployment {}", key);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn desired_size(agent: &HomeAgent) -> Result<i32, ControllerError> {
    if agent.spec.size < 0 {
        return Err(ControllerError::InvalidResource(format!(
            "spec.size must not be negative, got {}",
            agent.spec.size
        )));
    }
    Ok(agent.spec.size)
}

fn ready_replicas(deployment: &Deployment) -> i32 {
    deployment
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0)
}

/// Addresses of the live pods ordered by pod name.
///
/// Returns `None` unless exactly `size` live pods exist and every one of them
/// has been assigned an address. Pods already marked for deletion and pods
/// that have terminated (evicted, completed) are ignored.
fn collect_addresses(pods: Vec<Pod>, size: i32) -> Option<Vec<String>> {
    let mut live: Vec<Pod> = pods.into_iter().filter(is_live).collect();
    if i32::try_from(live.len()).ok() != Some(size) {
        return None;
    }
    live.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

    live.into_iter()
        .map(|pod| {
            pod.status
                .and_then(|status| status.pod_ip)
                .filter(|ip| !ip.is_empty())
        })
        .collect()
}

/// Terminated pods keep their labels until pod GC removes them
fn is_live(pod: &Pod) -> bool {
    if pod.metadata.deletion_timestamp.is_some() {
        return false;
    }
    let phase = pod.status.as_ref().and_then(|status| status.phase.as_deref());
    !matches!(phase, Some("Failed" | "Succeeded"))
}
