//! Common re-exports used throughout the crate.

pub use crate::config::{ControllerConfig, SharedControllerConfig};
pub use crate::crd::{
    AcrPullBindingStatus, AcrPullBindingV1beta1, AcrPullBindingV1beta2, AuthConfig, CloudConfig,
    Environment,
};
pub use crate::controller::binding::AcrBinding;
pub use crate::controller::planner::{plan, Action, ObservedState};
pub use crate::controller::reconcile::{ReconcileContext, ReconcilerError};
