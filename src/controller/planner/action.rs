//! The planner's single-action output type (`spec.md` §4.3, §4.4).

use k8s_openapi::api::core::v1::Secret;

use crate::crd::AcrPullBindingStatus;

/// Desired write for a `ServiceAccount`'s `imagePullSecrets`, already
/// reordered per the ordering invariant (`spec.md` §3): managed entries
/// follow unrelated ones, and new-convention names precede legacy ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountUpdate {
    pub name: String,
    pub namespace: String,
    pub image_pull_secrets: Vec<String>,
}

/// Exactly one mutation, or none. Returning more than one is a programmer
/// error in the planner and must panic (`spec.md` §4.3) — the type itself
/// enforces this by construction.
pub enum Action<B> {
    UpdatePullBinding(B),
    UpdatePullBindingStatus(AcrPullBindingStatus),
    Noop,
    CreateSecret(Box<Secret>),
    UpdateSecret(Box<Secret>),
    DeleteSecret { name: String, namespace: String },
    UpdateServiceAccount(ServiceAccountUpdate),
    Nil,
}

impl<B: std::fmt::Debug> std::fmt::Debug for Action<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdatePullBinding(b) => f.debug_tuple("UpdatePullBinding").field(b).finish(),
            Self::UpdatePullBindingStatus(s) => {
                f.debug_tuple("UpdatePullBindingStatus").field(s).finish()
            }
            Self::Noop => write!(f, "Noop"),
            Self::CreateSecret(s) => f.debug_tuple("CreateSecret").field(&s.metadata.name).finish(),
            Self::UpdateSecret(s) => f.debug_tuple("UpdateSecret").field(&s.metadata.name).finish(),
            Self::DeleteSecret { name, namespace } => f
                .debug_struct("DeleteSecret")
                .field("name", name)
                .field("namespace", namespace)
                .finish(),
            Self::UpdateServiceAccount(u) => f.debug_tuple("UpdateServiceAccount").field(u).finish(),
            Self::Nil => write!(f, "Nil"),
        }
    }
}
