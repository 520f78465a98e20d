//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::reconciler::Reconciler;
use crate::workload::{WorkloadTemplate, selector_labels};
use crds::{HomeAgent, HomeAgentSpec, HomeAgentStatus};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStatus};
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube_store::{MockStore, ObjectKey};
use std::time::Duration;

/// Requeue delay used by test reconcilers
pub const TEST_REQUEUE_DELAY: Duration = Duration::from_millis(800);

/// Helper to create a test HomeAgent CRD
pub fn create_test_home_agent(name: &str, namespace: &str, size: i32) -> HomeAgent {
    HomeAgent {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: HomeAgentSpec { size },
        status: None,
    }
}

/// Helper to create a HomeAgent that already reports addresses
pub fn create_test_home_agent_with_status(
    name: &str,
    namespace: &str,
    size: i32,
    addresses: &[&str],
) -> HomeAgent {
    let mut agent = create_test_home_agent(name, namespace, size);
    agent.status = Some(HomeAgentStatus {
        node_addresses: addresses.iter().map(|a| a.to_string()).collect(),
    });
    agent
}

/// Helper to create the managed Deployment of a HomeAgent
pub fn create_test_deployment(
    name: &str,
    namespace: &str,
    replicas: i32,
    ready_replicas: Option<i32>,
) -> Deployment {
    let agent = create_test_home_agent(name, namespace, replicas);
    let mut deployment = WorkloadTemplate::default().build(&agent, replicas);
    deployment.status = ready_replicas.map(|ready| DeploymentStatus {
        ready_replicas: Some(ready),
        ..Default::default()
    });
    deployment
}

/// Helper to create a Deployment with the same identity but no parent label
pub fn create_foreign_deployment(name: &str, namespace: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec::default()),
        status: None,
    }
}

/// Helper to create an agent instance pod
pub fn create_test_pod(pod_name: &str, namespace: &str, parent: &str, ip: Option<&str>) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(pod_name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(selector_labels(parent)),
            ..Default::default()
        },
        spec: None,
        status: Some(PodStatus {
            pod_ip: ip.map(str::to_string),
            ..Default::default()
        }),
    }
}

/// Helper to create a pod that is being deleted
pub fn create_terminating_pod(pod_name: &str, namespace: &str, parent: &str, ip: &str) -> Pod {
    let mut pod = create_test_pod(pod_name, namespace, parent, Some(ip));
    let deleted_at: Time = serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap();
    pod.metadata.deletion_timestamp = Some(deleted_at);
    pod
}

/// Helper to create a pod that has terminated with `phase` and lost its address
pub fn create_finished_pod(pod_name: &str, namespace: &str, parent: &str, phase: &str) -> Pod {
    let mut pod = create_test_pod(pod_name, namespace, parent, None);
    if let Some(status) = pod.status.as_mut() {
        status.phase = Some(phase.to_string());
        if phase == "Failed" {
            status.reason = Some("Evicted".to_string());
        }
    }
    pod
}

/// Helper to create a reconciler backed by `store`
pub fn create_test_reconciler(store: &MockStore) -> Reconciler {
    Reconciler::new(store.clone(), WorkloadTemplate::default(), TEST_REQUEUE_DELAY)
}

/// Key shared by a HomeAgent and its Deployment
pub fn key(namespace: &str, name: &str) -> ObjectKey {
    ObjectKey::new(namespace, name)
}
