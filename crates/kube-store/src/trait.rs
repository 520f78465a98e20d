//! ResourceStore trait for mocking
//!
//! This trait abstracts the Kubernetes API calls made by the reconciler so
//! that unit tests can run against an in-memory store. The concrete
//! [`KubeStore`](crate::KubeStore) implements it on top of `kube::Api`.

use crate::error::StoreError;
use crate::key::ObjectKey;
use crds::{HomeAgent, HomeAgentStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;

/// Store operations the HomeAgent reconciler depends on.
///
/// Reads return [`StoreError::NotFound`] when the object is absent so that
/// callers can branch on absence without inspecting transport errors.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    /// Get a HomeAgent by identity
    async fn get_home_agent(&self, key: &ObjectKey) -> Result<HomeAgent, StoreError>;

    /// Replace the status subresource of a HomeAgent.
    ///
    /// Only the status is written; concurrent spec writers are never overridden.
    async fn update_home_agent_status(
        &self,
        key: &ObjectKey,
        status: &HomeAgentStatus,
    ) -> Result<(), StoreError>;

    /// Get a Deployment by identity
    async fn get_deployment(&self, key: &ObjectKey) -> Result<Deployment, StoreError>;

    /// Create a Deployment in the namespace of `key`.
    ///
    /// Returns [`StoreError::AlreadyExists`] if an object with the same
    /// identity is already present.
    async fn create_deployment(
        &self,
        key: &ObjectKey,
        deployment: &Deployment,
    ) -> Result<(), StoreError>;

    /// Set `spec.replicas` of an existing Deployment
    async fn scale_deployment(&self, key: &ObjectKey, replicas: i32) -> Result<(), StoreError>;

    /// Delete a Deployment.
    ///
    /// Returns [`StoreError::NotFound`] if it is already gone.
    async fn delete_deployment(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// List pods in `namespace` matching a label selector such as `parent=pool`
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, StoreError>;
}
