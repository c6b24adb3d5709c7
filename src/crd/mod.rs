//! Custom resource definitions: two storage versions sharing status and
//! auth/cloud schema components (§3, §6, §8 of the controller's spec).

mod common;
mod status;
pub mod v1beta1;
pub mod v1beta2;

pub use common::{AuthConfig, CloudConfig, Environment, ManagedIdentityAuth, WorkloadIdentityAuth};
pub use status::AcrPullBindingStatus;
pub use v1beta1::AcrPullBinding as AcrPullBindingV1beta1;
pub use v1beta1::AcrPullBindingV1beta1Spec;
pub use v1beta2::AcrConfig;
pub use v1beta2::AcrPullBinding as AcrPullBindingV1beta2;
pub use v1beta2::AcrPullBindingV1beta2Spec;
