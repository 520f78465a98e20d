//! Managed workload construction.
//!
//! Every HomeAgent is backed by a Deployment with the same namespace and
//! name. Its pods carry a `parent=<HomeAgent name>` label, which is both the
//! Deployment selector and the selector used to find the agent instances.

use crds::HomeAgent;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, PodSpec, PodTemplateSpec, SecurityContext,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Label linking pods and deployments to their HomeAgent
pub const PARENT_LABEL: &str = "parent";

/// Name of the agent container
pub const AGENT_CONTAINER_NAME: &str = "ha";

/// Image run by agent instances unless configured otherwise
pub const DEFAULT_AGENT_IMAGE: &str = "kismi/mo-daemon:latest";

/// Labels selecting the instances of the HomeAgent named `name`
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(PARENT_LABEL.to_string(), name.to_string())])
}

/// Label selector string (`parent=<name>`) for list calls
pub fn label_selector(name: &str) -> String {
    format!("{}={}", PARENT_LABEL, name)
}

/// Whether a Deployment carries the parent label of the HomeAgent `name`
pub fn is_managed_by(deployment: &Deployment, name: &str) -> bool {
    deployment.labels().get(PARENT_LABEL).map(String::as_str) == Some(name)
}

/// Fixed pod template settings shared by all agent instances
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadTemplate {
    image: String,
    image_pull_policy: String,
}

impl WorkloadTemplate {
    pub fn new(image: impl Into<String>, image_pull_policy: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            image_pull_policy: image_pull_policy.into(),
        }
    }

    /// Build the Deployment running `replicas` instances for `agent`.
    ///
    /// The Deployment is controller-owned by the HomeAgent when the agent
    /// carries a UID, so the API server garbage-collects it with its parent
    /// and owner-based watches map its events back to the HomeAgent.
    pub fn build(&self, agent: &HomeAgent, replicas: i32) -> Deployment {
        let name = agent.name_any();
        let labels = selector_labels(&name);

        Deployment {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: agent.namespace(),
                labels: Some(labels.clone()),
                owner_references: agent.controller_owner_ref(&()).map(|owner| vec![owner]),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![self.agent_container()],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        }
    }

    fn agent_container(&self) -> Container {
        Container {
            name: AGENT_CONTAINER_NAME.to_string(),
            image: Some(self.image.clone()),
            image_pull_policy: Some(self.image_pull_policy.clone()),
            // The agent manages tunnel interfaces inside its pod
            security_context: Some(SecurityContext {
                capabilities: Some(Capabilities {
                    add: Some(vec!["NET_ADMIN".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

impl Default for WorkloadTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_IMAGE, "Always")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_home_agent;

    #[test]
    fn test_label_selector() {
        assert_eq!(label_selector("pool"), "parent=pool");
        assert_eq!(selector_labels("pool").get("parent").map(String::as_str), Some("pool"));
    }

    #[test]
    fn test_build_deployment_shape() {
        let agent = create_test_home_agent("pool", "edge", 2);
        let deployment = WorkloadTemplate::default().build(&agent, 2);

        assert_eq!(deployment.metadata.name.as_deref(), Some("pool"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("edge"));
        assert!(is_managed_by(&deployment, "pool"));

        let spec = deployment.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(2));
        assert_eq!(spec.selector.match_labels, Some(selector_labels("pool")));

        let template_labels = spec.template.metadata.as_ref().unwrap().labels.clone();
        assert_eq!(template_labels, Some(selector_labels("pool")));

        let containers = &spec.template.spec.as_ref().unwrap().containers;
        assert_eq!(containers.len(), 1);
        let container = &containers[0];
        assert_eq!(container.name, "ha");
        assert_eq!(container.image.as_deref(), Some("kismi/mo-daemon:latest"));
        assert_eq!(container.image_pull_policy.as_deref(), Some("Always"));
        let added = container
            .security_context
            .as_ref()
            .and_then(|sc| sc.capabilities.as_ref())
            .and_then(|caps| caps.add.clone());
        assert_eq!(added, Some(vec!["NET_ADMIN".to_string()]));
    }

    #[test]
    fn test_build_sets_controller_owner_reference() {
        let agent = create_test_home_agent("pool", "edge", 1);
        let deployment = WorkloadTemplate::default().build(&agent, 1);

        let owners = deployment.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "HomeAgent");
        assert_eq!(owners[0].name, "pool");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn test_build_without_uid_has_no_owner() {
        let mut agent = create_test_home_agent("pool", "edge", 1);
        agent.metadata.uid = None;
        let deployment = WorkloadTemplate::default().build(&agent, 1);
        assert!(deployment.metadata.owner_references.is_none());
    }

    #[test]
    fn test_custom_image() {
        let agent = create_test_home_agent("pool", "edge", 1);
        let template = WorkloadTemplate::new("registry.local/agent:1.2", "IfNotPresent");
        let deployment = template.build(&agent, 1);
        let container = &deployment.spec.unwrap().template.spec.unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("registry.local/agent:1.2"));
        assert_eq!(container.image_pull_policy.as_deref(), Some("IfNotPresent"));
    }

    #[test]
    fn test_is_managed_by_rejects_foreign_deployment() {
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some("pool".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!is_managed_by(&deployment, "pool"));
    }
}
