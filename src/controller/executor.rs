//! Action Executor (C5, `spec.md` §4.4): applies exactly one [`Action`] and
//! computes the next requeue delay. Stateless and deterministic — it never
//! chooses what to do, only how to issue it.

use k8s_openapi::api::core::v1::{LocalObjectReference, Secret, ServiceAccount};
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use std::time::Duration;
use thiserror::Error;

use crate::constants::MIN_REQUEUE_SECS;
use crate::controller::binding::AcrBinding;
use crate::controller::planner::{Action, ServiceAccountUpdate};

const FIELD_MANAGER: &str = "acrpull-controller";

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

/// Applies `action` against the cluster. `namespace` and `binding_name` are
/// the reconciled binding's identity, needed by the status-patch variant
/// since it carries only the new status value.
pub async fn execute<B: AcrBinding>(
    client: &kube::Client,
    namespace: &str,
    binding_name: &str,
    action: Action<B>,
) -> Result<(), ExecutorError> {
    match action {
        Action::UpdatePullBinding(binding) => {
            let name = binding.meta().name.clone().unwrap_or_default();
            let api: Api<B> = Api::namespaced(client.clone(), namespace);
            api.replace(&name, &PostParams::default(), &binding).await?;
        }
        Action::UpdatePullBindingStatus(status) => {
            let api: Api<B> = Api::namespaced(client.clone(), namespace);
            let patch = serde_json::json!({ "status": status });
            api.patch_status(binding_name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
                .await?;
        }
        Action::Noop | Action::Nil => {}
        Action::CreateSecret(secret) => {
            let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
            api.create(&PostParams::default(), &secret).await?;
        }
        Action::UpdateSecret(secret) => {
            let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
            let name = secret.metadata.name.clone().unwrap_or_default();
            api.replace(&name, &PostParams::default(), &secret).await?;
        }
        Action::DeleteSecret { name, namespace: ns } => {
            let api: Api<Secret> = Api::namespaced(client.clone(), &ns);
            api.delete(&name, &DeleteParams::default()).await?;
        }
        Action::UpdateServiceAccount(update) => {
            apply_service_account_update(client, &update).await?;
        }
    }
    Ok(())
}

async fn apply_service_account_update(
    client: &kube::Client,
    update: &ServiceAccountUpdate,
) -> Result<(), ExecutorError> {
    let api: Api<ServiceAccount> = Api::namespaced(client.clone(), &update.namespace);
    let refs: Vec<LocalObjectReference> = update
        .image_pull_secrets
        .iter()
        .map(|name| LocalObjectReference { name: Some(name.clone()) })
        .collect();
    let patch = serde_json::json!({ "imagePullSecrets": refs });
    api.patch(&update.name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
        .await?;
    Ok(())
}

/// `clamp(refreshBoundary - now, min = 1s)` (`spec.md` §4.3).
pub fn requeue_after(refresh_boundary: chrono::DateTime<chrono::Utc>, now: chrono::DateTime<chrono::Utc>) -> Duration {
    let delta = (refresh_boundary - now).num_seconds().max(MIN_REQUEUE_SECS as i64);
    Duration::from_secs(delta as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn clamps_to_floor() {
        let now = chrono::Utc::now();
        let boundary = now - ChronoDuration::seconds(30);
        assert_eq!(requeue_after(boundary, now), Duration::from_secs(MIN_REQUEUE_SECS));
    }

    #[test]
    fn passes_through_positive_delay() {
        let now = chrono::Utc::now();
        let boundary = now + ChronoDuration::seconds(120);
        assert_eq!(requeue_after(boundary, now), Duration::from_secs(120));
    }
}
