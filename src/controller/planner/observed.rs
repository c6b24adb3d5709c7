//! Observed cluster state fed into the planner (`spec.md` §4.3).

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};

use crate::config::ControllerConfig;
use crate::controller::binding::AcrBinding;

/// Everything the planner needs to decide on exactly one [`super::Action`].
///
/// Assembled by the reconciler from informer-cache lookups before `plan()`
/// is called; the planner itself performs no I/O.
pub struct ObservedState<B: AcrBinding> {
    pub binding: B,
    pub target_service_account: Option<ServiceAccount>,
    /// Service accounts, other than the current target, that still carry a
    /// reference to this binding's managed pull-secret name.
    pub other_referencing_service_accounts: Vec<ServiceAccount>,
    /// Secrets labeled `binding = <binding.name>`, or recognized as the
    /// binding's legacy-named secret.
    pub pull_secrets: Vec<Secret>,
    pub now: DateTime<Utc>,
    pub config: ControllerConfig,
}
