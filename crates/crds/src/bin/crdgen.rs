//! Prints the LlamaStackDistribution CRD as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/llamastackdistribution.yaml`

use crds::LlamaStackDistribution;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = LlamaStackDistribution::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
