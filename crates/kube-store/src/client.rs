//! Kubernetes-backed resource store
//!
//! Implements [`ResourceStore`] with `kube::Api` handles scoped to the
//! namespace of each request.

use crate::error::StoreError;
use crate::key::ObjectKey;
use crate::store_trait::ResourceStore;
use crds::{HomeAgent, HomeAgentStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

/// Field manager recorded on every write made by the operator
pub const FIELD_MANAGER: &str = "home-agent-controller";

/// Resource store talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    /// Create a new store from a Kubernetes client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn home_agents(&self, namespace: &str) -> Api<HomeAgent> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        }
    }
}

#[async_trait::async_trait]
impl ResourceStore for KubeStore {
    async fn get_home_agent(&self, key: &ObjectKey) -> Result<HomeAgent, StoreError> {
        debug!("GET HomeAgent {}", key);
        self.home_agents(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(e, format!("HomeAgent {}", key)))
    }

    async fn update_home_agent_status(
        &self,
        key: &ObjectKey,
        status: &HomeAgentStatus,
    ) -> Result<(), StoreError> {
        debug!("PATCH HomeAgent {} status", key);
        // JSON merge patch replaces arrays wholesale, so the address list is
        // swapped atomically rather than merged element-wise.
        let status_patch = json!({ "status": status });
        self.home_agents(&key.namespace)
            .patch_status(&key.name, &Self::patch_params(), &Patch::Merge(&status_patch))
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, format!("HomeAgent {}", key)))
    }

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Deployment, StoreError> {
        debug!("GET Deployment {}", key);
        self.deployments(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(e, format!("Deployment {}", key)))
    }

    async fn create_deployment(
        &self,
        key: &ObjectKey,
        deployment: &Deployment,
    ) -> Result<(), StoreError> {
        debug!("POST Deployment {}", key);
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        self.deployments(&key.namespace)
            .create(&pp, deployment)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, format!("Deployment {}", key)))
    }

    async fn scale_deployment(&self, key: &ObjectKey, replicas: i32) -> Result<(), StoreError> {
        debug!("PATCH Deployment {} replicas={}", key, replicas);
        let patch = json!({ "spec": { "replicas": replicas } });
        self.deployments(&key.namespace)
            .patch(&key.name, &Self::patch_params(), &Patch::Merge(&patch))
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, format!("Deployment {}", key)))
    }

    async fn delete_deployment(&self, key: &ObjectKey) -> Result<(), StoreError> {
        debug!("DELETE Deployment {}", key);
        self.deployments(&key.namespace)
            .delete(&key.name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, format!("Deployment {}", key)))
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, StoreError> {
        debug!("LIST Pods {} selector={}", namespace, label_selector);
        let lp = ListParams::default().labels(label_selector);
        self.pods(namespace)
            .list(&lp)
            .await
            .map(|list| list.items)
            .map_err(|e| StoreError::from_kube(e, format!("Pods {} ({})", namespace, label_selector)))
    }
}
