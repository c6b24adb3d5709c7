//! Prints the `ACRPullBinding` CRD YAML for both supported versions.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/acrpullbinding.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use acrpull_controller::crd::{AcrPullBindingV1beta1, AcrPullBindingV1beta2};
use kube::core::CustomResourceExt;

fn main() {
    for crd in [AcrPullBindingV1beta1::crd(), AcrPullBindingV1beta2::crd()] {
        match serde_yaml::to_string(&crd) {
            Ok(yaml) => println!("{yaml}---"),
            Err(e) => {
                eprintln!("failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
