//! Mock ResourceStore for unit testing
//!
//! This module provides an in-memory implementation of [`ResourceStore`]
//! that can be used in unit tests without a running API server. Every call
//! is recorded so tests can assert on the mutations a reconcile issued, and
//! failures can be injected per operation.

use crate::error::StoreError;
use crate::key::ObjectKey;
use crate::store_trait::ResourceStore;
use crds::{HomeAgent, HomeAgentStatus};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStatus};
use k8s_openapi::api::core::v1::Pod;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Store operation kinds, used for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetHomeAgent,
    UpdateHomeAgentStatus,
    GetDeployment,
    CreateDeployment,
    ScaleDeployment,
    DeleteDeployment,
    ListPods,
}

impl StoreOp {
    /// Whether the operation mutates the store
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::UpdateHomeAgentStatus
                | Self::CreateDeployment
                | Self::ScaleDeployment
                | Self::DeleteDeployment
        )
    }
}

/// A recorded call against the mock store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub target: String,
}

/// Mock ResourceStore for testing
///
/// Cloning shares the underlying state, so a test can hand one clone to the
/// reconciler and keep another for setup and assertions.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    pub(crate) home_agents: Arc<Mutex<HashMap<ObjectKey, HomeAgent>>>,
    pub(crate) deployments: Arc<Mutex<HashMap<ObjectKey, Deployment>>>,
    pub(crate) pods: Arc<Mutex<Vec<Pod>>>,
    pub(crate) calls: Arc<Mutex<Vec<StoreCall>>>,
    pub(crate) failures: Arc<Mutex<HashMap<StoreOp, StoreError>>>,
}

impl MockStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a HomeAgent (for test setup)
    pub fn add_home_agent(&self, agent: HomeAgent) {
        let key = ObjectKey::new(
            agent.metadata.namespace.clone().unwrap_or_default(),
            agent.metadata.name.clone().unwrap_or_default(),
        );
        self.home_agents.lock().unwrap().insert(key, agent);
    }

    /// Remove a HomeAgent (for test setup)
    pub fn remove_home_agent(&self, key: &ObjectKey) {
        self.home_agents.lock().unwrap().remove(key);
    }

    /// Current copy of a HomeAgent, if present
    pub fn home_agent(&self, key: &ObjectKey) -> Option<HomeAgent> {
        self.home_agents.lock().unwrap().get(key).cloned()
    }

    /// Add or replace a Deployment (for test setup)
    pub fn add_deployment(&self, deployment: Deployment) {
        let key = ObjectKey::new(
            deployment.metadata.namespace.clone().unwrap_or_default(),
            deployment.metadata.name.clone().unwrap_or_default(),
        );
        self.deployments.lock().unwrap().insert(key, deployment);
    }

    /// Current copy of a Deployment, if present
    pub fn deployment(&self, key: &ObjectKey) -> Option<Deployment> {
        self.deployments.lock().unwrap().get(key).cloned()
    }

    /// Set `status.readyReplicas` of a stored Deployment, as the
    /// deployment controller would once pods become ready
    pub fn set_ready_replicas(&self, key: &ObjectKey, ready: i32) {
        if let Some(deployment) = self.deployments.lock().unwrap().get_mut(key) {
            let status = deployment.status.get_or_insert_with(DeploymentStatus::default);
            status.ready_replicas = Some(ready);
        }
    }

    /// Add a pod (for test setup)
    pub fn add_pod(&self, pod: Pod) {
        self.pods.lock().unwrap().push(pod);
    }

    /// Make the next call of `op` fail with `error`
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.failures.lock().unwrap().insert(op, error);
    }

    /// All calls recorded so far
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls of `op`
    pub fn count(&self, op: StoreOp) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.op == op).count()
    }

    /// Number of recorded mutating calls
    pub fn mutation_count(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.op.is_mutation()).count()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, op: StoreOp, target: impl Into<String>) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(StoreCall {
            op,
            target: target.into(),
        });
        match self.failures.lock().unwrap().remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn matches_selector(labels: Option<&BTreeMap<String, String>>, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.and_then(|l| l.get(k.trim())).map(String::as_str) == Some(v.trim()),
            None => false,
        })
}

#[async_trait::async_trait]
impl ResourceStore for MockStore {
    async fn get_home_agent(&self, key: &ObjectKey) -> Result<HomeAgent, StoreError> {
        self.record(StoreOp::GetHomeAgent, key.to_string())?;
        self.home_agent(key)
            .ok_or_else(|| StoreError::NotFound(format!("HomeAgent {}", key)))
    }

    async fn update_home_agent_status(
        &self,
        key: &ObjectKey,
        status: &HomeAgentStatus,
    ) -> Result<(), StoreError> {
        self.record(StoreOp::UpdateHomeAgentStatus, key.to_string())?;
        let mut agents = self.home_agents.lock().unwrap();
        let agent = agents
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("HomeAgent {}", key)))?;
        agent.status = Some(status.clone());
        Ok(())
    }

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Deployment, StoreError> {
        self.record(StoreOp::GetDeployment, key.to_string())?;
        self.deployment(key)
            .ok_or_else(|| StoreError::NotFound(format!("Deployment {}", key)))
    }

    async fn create_deployment(
        &self,
        key: &ObjectKey,
        deployment: &Deployment,
    ) -> Result<(), StoreError> {
        self.record(StoreOp::CreateDeployment, key.to_string())?;
        let mut deployments = self.deployments.lock().unwrap();
        if deployments.contains_key(key) {
            return Err(StoreError::AlreadyExists(format!("Deployment {}", key)));
        }
        let mut created = deployment.clone();
        created.metadata.namespace = Some(key.namespace.clone());
        deployments.insert(key.clone(), created);
        Ok(())
    }

    async fn scale_deployment(&self, key: &ObjectKey, replicas: i32) -> Result<(), StoreError> {
        self.record(StoreOp::ScaleDeployment, format!("{} replicas={}", key, replicas))?;
        let mut deployments = self.deployments.lock().unwrap();
        let deployment = deployments
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("Deployment {}", key)))?;
        deployment
            .spec
            .get_or_insert_with(DeploymentSpec::default)
            .replicas = Some(replicas);
        Ok(())
    }

    async fn delete_deployment(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.record(StoreOp::DeleteDeployment, key.to_string())?;
        self.deployments
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Deployment {}", key)))
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, StoreError> {
        self.record(StoreOp::ListPods, format!("{} {}", namespace, label_selector))?;
        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .filter(|pod| pod.metadata.namespace.as_deref() == Some(namespace))
            .filter(|pod| matches_selector(pod.metadata.labels.as_ref(), label_selector))
            .cloned()
            .collect())
    }
}
