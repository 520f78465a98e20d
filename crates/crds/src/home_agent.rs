//! HomeAgent CRD
//!
//! Declares a pool of network-access agent instances and publishes the
//! addresses of the running instances back in its status.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the HomeAgent CRD
pub const HOME_AGENT_GROUP: &str = "prairie.kismi";

/// Desired state of a HomeAgent pool.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "prairie.kismi",
    version = "v1",
    kind = "HomeAgent",
    namespaced,
    status = "HomeAgentStatus",
    shortname = "ha",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Size","type":"integer","jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HomeAgentSpec {
    /// Number of agent instances to run
    #[schemars(range(min = 0))]
    pub size: i32,
}

/// Observed state of a HomeAgent pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HomeAgentStatus {
    /// Pod addresses of the agent instances, ordered by pod name.
    /// Only written once every instance is ready and has an address.
    #[serde(default)]
    pub node_addresses: Vec<String>,
}
