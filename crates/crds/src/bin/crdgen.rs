//! Prints the HomeAgent CRD manifest as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/homeagents.yaml`

use crds::HomeAgent;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&HomeAgent::crd())?);
    Ok(())
}
