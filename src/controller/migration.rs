//! Legacy Migration Controller (C7, `spec.md` §4.6).
//!
//! Runs only while some legacy-suffixed secret exists without the managed
//! label. Labels each one as its owning binding is reconciled; once none
//! remain, signals the process to exit so the next start can filter Secret
//! informers by label selector (§4.5) instead of observing every secret.

use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams, Patch, PatchParams};
use thiserror::Error;

use crate::constants::BINDING_LABEL;
use crate::controller::binding::AcrBinding;
use crate::controller::naming;

const FIELD_MANAGER: &str = "acrpull-controller-migration";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

#[derive(Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The binding's legacy secret was found unlabeled and has been labeled.
    Labeled,
    /// No action for this binding; caller should check overall completion.
    Continue,
}

fn is_unlabeled_legacy(secret: &Secret) -> bool {
    let Some(name) = secret.metadata.name.as_deref() else {
        return false;
    };
    if naming::binding_name_from_legacy(name).is_none() {
        return false;
    }
    !secret
        .metadata
        .labels
        .as_ref()
        .is_some_and(|labels| labels.contains_key(BINDING_LABEL))
}

/// True while any unlabeled legacy secret exists anywhere in the cluster.
pub async fn should_run(client: &kube::Client) -> Result<bool, MigrationError> {
    let secrets: Api<Secret> = Api::all(client.clone());
    let list = secrets.list(&ListParams::default()).await?;
    Ok(list.items.iter().any(is_unlabeled_legacy))
}

/// Step 1 of §4.6 for one binding: label its legacy secret if it exists and
/// is unlabeled.
pub async fn migrate_binding<B: AcrBinding>(
    client: &kube::Client,
    binding: &B,
) -> Result<MigrationOutcome, MigrationError> {
    let Some(namespace) = binding.meta().namespace.clone() else {
        return Ok(MigrationOutcome::Continue);
    };
    let legacy_name = naming::legacy_secret_name(binding.meta().name.as_deref().unwrap_or_default());

    let secrets: Api<Secret> = Api::namespaced(client.clone(), &namespace);
    let Ok(secret) = secrets.get(&legacy_name).await else {
        return Ok(MigrationOutcome::Continue);
    };
    if !is_unlabeled_legacy(&secret) {
        return Ok(MigrationOutcome::Continue);
    }

    let patch = serde_json::json!({
        "metadata": {
            "labels": { BINDING_LABEL: binding.meta().name.as_deref().unwrap_or_default() }
        }
    });
    secrets
        .patch(&legacy_name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
        .await?;
    Ok(MigrationOutcome::Labeled)
}

/// Step 2 of §4.6: true once no unlabeled legacy secret remains anywhere.
pub async fn check_completion(client: &kube::Client) -> Result<bool, MigrationError> {
    Ok(!should_run(client).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn secret(name: &str, labeled: bool) -> Secret {
        let mut labels = BTreeMap::new();
        if labeled {
            labels.insert(BINDING_LABEL.to_string(), "my-binding".to_string());
        }
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: if labels.is_empty() { None } else { Some(labels) },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn unlabeled_legacy_secret_is_flagged() {
        assert!(is_unlabeled_legacy(&secret("my-binding-msi-acrpull-secret", false)));
    }

    #[test]
    fn labeled_legacy_secret_is_not_flagged() {
        assert!(!is_unlabeled_legacy(&secret("my-binding-msi-acrpull-secret", true)));
    }

    #[test]
    fn non_legacy_secret_is_never_flagged() {
        assert!(!is_unlabeled_legacy(&secret("acr-pull-my-binding", false)));
    }
}
