//! Integration tests for the Kubernetes resource store
//!
//! These tests require a reachable cluster with the HomeAgent CRD installed
//! (`cargo run -p crds --bin crdgen | kubectl apply -f -`).
//! Set TEST_NAMESPACE to choose the namespace (default: "default").

use crds::{HomeAgent, HomeAgentSpec, HomeAgentStatus};
use kube::Api;
use kube::api::{DeleteParams, PostParams};
use kube_store::{KubeStore, ObjectKey, ResourceStore};

fn test_namespace() -> String {
    std::env::var("TEST_NAMESPACE").unwrap_or_else(|_| "default".to_string())
}

#[tokio::test]
#[ignore] // Requires a running cluster
async fn test_missing_home_agent_is_not_found() {
    let client = kube::Client::try_default().await.expect("Failed to create client");
    let store = KubeStore::new(client);

    let key = ObjectKey::new(test_namespace(), "home-agent-does-not-exist");
    let err = store.get_home_agent(&key).await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {}", err);
}

#[tokio::test]
#[ignore] // Requires a running cluster
async fn test_missing_deployment_delete_is_not_found() {
    let client = kube::Client::try_default().await.expect("Failed to create client");
    let store = KubeStore::new(client);

    let key = ObjectKey::new(test_namespace(), "home-agent-does-not-exist");
    let err = store.delete_deployment(&key).await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {}", err);
}

#[tokio::test]
#[ignore] // Requires a running cluster with the HomeAgent CRD
async fn test_status_round_trip() {
    let client = kube::Client::try_default().await.expect("Failed to create client");
    let namespace = test_namespace();
    let api: Api<HomeAgent> = Api::namespaced(client.clone(), &namespace);
    let store = KubeStore::new(client);

    let agent = HomeAgent::new("kube-store-it", HomeAgentSpec { size: 1 });
    let _ = api.delete("kube-store-it", &DeleteParams::default()).await;
    api.create(&PostParams::default(), &agent)
        .await
        .expect("Failed to create HomeAgent");

    let key = ObjectKey::new(&namespace, "kube-store-it");
    let status = HomeAgentStatus {
        node_addresses: vec!["2001:db8::1".to_string()],
    };
    store
        .update_home_agent_status(&key, &status)
        .await
        .expect("Failed to update status");

    let fetched = store.get_home_agent(&key).await.expect("Failed to get HomeAgent");
    assert_eq!(fetched.status, Some(status));

    api.delete("kube-store-it", &DeleteParams::default())
        .await
        .expect("Failed to delete HomeAgent");
}
