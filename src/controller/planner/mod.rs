//! Reconciliation Planner (`spec.md` §4.3): a pure function of observed
//! state that decides exactly one [`Action`]. It performs no I/O; when a
//! credential must be minted, `plan()` returns [`PlanOutcome::NeedsCredential`]
//! and the impure caller completes the decision via [`finish_with_credential`]
//! after talking to Azure.

mod action;
mod observed;

pub use action::{Action, ServiceAccountUpdate};
pub use observed::ObservedState;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::Resource;
use std::collections::BTreeMap;

use crate::constants::{ANNOTATION_TOKEN_EXPIRY, ANNOTATION_TOKEN_INPUTS, ANNOTATION_TOKEN_REFRESH, BINDING_LABEL};
use crate::controller::binding::AcrBinding;
use crate::controller::credential::{render_docker_config, CredentialError, CredentialRequest, MintedCredential};
use crate::controller::naming;

/// What `plan()` decided, possibly deferring to an Azure round trip.
pub enum PlanOutcome<B: AcrBinding> {
    Action(Action<B>),
    NeedsCredential(CredentialRequest),
}

pub fn plan<B: AcrBinding>(state: &ObservedState<B>) -> PlanOutcome<B> {
    let binding = &state.binding;

    // 1. Finalizer gate (live).
    if binding.meta().deletion_timestamp.is_none() && !binding.has_finalizer() {
        let mut updated = binding.clone();
        updated.add_finalizer();
        return PlanOutcome::Action(Action::UpdatePullBinding(updated));
    }

    // 2. Cleanup gate (terminating).
    if binding.meta().deletion_timestamp.is_some() {
        if !binding.has_finalizer() {
            return PlanOutcome::Action(Action::Nil);
        }

        let expected_name = binding.pull_secret_name();
        let legacy_name = naming::legacy_secret_name(binding.meta().name.as_deref().unwrap_or_default());

        if let Some(sa) = &state.target_service_account {
            if let Some(update) = remove_reference(sa, &expected_name, &legacy_name) {
                return PlanOutcome::Action(Action::UpdateServiceAccount(update));
            }
        }

        if let Some(secret) = state.pull_secrets.first() {
            return PlanOutcome::Action(Action::DeleteSecret {
                name: secret.metadata.name.clone().unwrap_or_default(),
                namespace: secret.metadata.namespace.clone().unwrap_or_default(),
            });
        }

        let mut updated = binding.clone();
        updated.remove_finalizer();
        return PlanOutcome::Action(Action::UpdatePullBinding(updated));
    }

    let expected_name = binding.pull_secret_name();
    let legacy_name = naming::legacy_secret_name(binding.meta().name.as_deref().unwrap_or_default());

    // 3. Retarget cleanup.
    for sa in &state.other_referencing_service_accounts {
        if let Some(update) = remove_reference(sa, &expected_name, &legacy_name) {
            return PlanOutcome::Action(Action::UpdateServiceAccount(update));
        }
    }

    // 4. Missing target.
    let Some(target_sa) = &state.target_service_account else {
        let name = binding.service_account_name();
        return PlanOutcome::Action(Action::UpdatePullBindingStatus(
            crate::crd::AcrPullBindingStatus::with_error(format!("service account \"{name}\" not found")),
        ));
    };

    // 5. Credential freshness.
    let resolved_auth = binding.auth(&state.config);
    let input_hash = binding.input_hash(&state.config, &resolved_auth);
    let existing_secret = state.pull_secrets.iter().find(|s| s.metadata.name.as_deref() == Some(expected_name.as_str()));

    let needs_refresh = match existing_secret {
        None => true,
        Some(secret) => {
            let inputs_changed = annotation(secret, ANNOTATION_TOKEN_INPUTS).as_deref() != Some(input_hash.as_str());
            let expired = match (parse_annotation_time(secret, ANNOTATION_TOKEN_REFRESH), parse_annotation_time(secret, ANNOTATION_TOKEN_EXPIRY)) {
                (Some(refresh), Some(expiry)) => state.now >= binding.refresh_boundary(refresh, expiry, &state.config),
                _ => true,
            };
            inputs_changed || expired
        }
    };

    if needs_refresh {
        let Some(server) = binding.acr_server(&state.config) else {
            return PlanOutcome::Action(Action::UpdatePullBindingStatus(
                crate::crd::AcrPullBindingStatus::with_error("acr server not configured"),
            ));
        };
        let Some(scope) = binding.acr_scope() else {
            return PlanOutcome::Action(Action::UpdatePullBindingStatus(
                crate::crd::AcrPullBindingStatus::with_error("acr scope not configured"),
            ));
        };
        return PlanOutcome::NeedsCredential(CredentialRequest {
            server,
            scope,
            environment: binding.environment(),
            cloud_config: binding.cloud_config(),
            auth: resolved_auth,
            namespace: binding.meta().namespace.clone().unwrap_or_default(),
            service_account_token_audience: state.config.service_account_token_audience.clone(),
        });
    }

    // 6. Service-account attach.
    let current_refs: Vec<String> = image_pull_secret_names(target_sa);
    if !current_refs.iter().any(|n| n == &expected_name) {
        let reordered = reordered_pull_secrets(&current_refs, Some(&expected_name), None);
        return PlanOutcome::Action(Action::UpdateServiceAccount(ServiceAccountUpdate {
            name: target_sa.metadata.name.clone().unwrap_or_default(),
            namespace: target_sa.metadata.namespace.clone().unwrap_or_default(),
            image_pull_secrets: reordered,
        }));
    }

    // 7. Extraneous secret cleanup.
    if let Some(extra) = state.pull_secrets.iter().find(|s| s.metadata.name.as_deref() != Some(expected_name.as_str())) {
        return PlanOutcome::Action(Action::DeleteSecret {
            name: extra.metadata.name.clone().unwrap_or_default(),
            namespace: extra.metadata.namespace.clone().unwrap_or_default(),
        });
    }

    // 8. Status sync.
    if let Some(secret) = existing_secret {
        match (parse_annotation_time(secret, ANNOTATION_TOKEN_EXPIRY), parse_annotation_time(secret, ANNOTATION_TOKEN_REFRESH)) {
            (Some(expiry), Some(refresh)) => {
                let status = binding.status();
                if status.token_expiration_time != Some(expiry) || status.last_token_refresh_time != Some(refresh) {
                    return PlanOutcome::Action(Action::UpdatePullBindingStatus(crate::crd::AcrPullBindingStatus {
                        last_token_refresh_time: Some(refresh),
                        token_expiration_time: Some(expiry),
                        error: String::new(),
                    }));
                }
            }
            _ => return PlanOutcome::Action(Action::Nil),
        }
    }

    // 9. Otherwise.
    PlanOutcome::Action(Action::Noop)
}

/// Completes a [`PlanOutcome::NeedsCredential`] decision once the caller has
/// performed the Azure round trip. Still a pure function of its inputs.
pub fn finish_with_credential<B: AcrBinding>(
    state: &ObservedState<B>,
    result: Result<MintedCredential, CredentialError>,
) -> Action<B> {
    let binding = &state.binding;
    let expected_name = binding.pull_secret_name();

    let minted = match result {
        Ok(m) => m,
        Err(e) => return Action::UpdatePullBindingStatus(crate::crd::AcrPullBindingStatus::with_error(e.to_string())),
    };

    let resolved_auth = binding.auth(&state.config);
    let input_hash = binding.input_hash(&state.config, &resolved_auth);
    let server = binding.acr_server(&state.config).unwrap_or_default();

    let mut annotations = BTreeMap::new();
    annotations.insert(ANNOTATION_TOKEN_EXPIRY.to_string(), minted.expiry.to_rfc3339());
    annotations.insert(ANNOTATION_TOKEN_REFRESH.to_string(), state.now.to_rfc3339());
    annotations.insert(ANNOTATION_TOKEN_INPUTS.to_string(), input_hash);

    let mut labels = BTreeMap::new();
    labels.insert(BINDING_LABEL.to_string(), binding.meta().name.clone().unwrap_or_default());

    let owner_ref = OwnerReference {
        api_version: B::api_version(&()).to_string(),
        kind: B::kind(&()).to_string(),
        name: binding.meta().name.clone().unwrap_or_default(),
        uid: binding.meta().uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
        ..Default::default()
    };

    let docker_config = render_docker_config(&server, &minted.refresh_token);
    let mut data = BTreeMap::new();
    data.insert(".dockerconfigjson".to_string(), ByteString(docker_config.into_bytes()));

    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(expected_name.clone()),
            namespace: binding.meta().namespace.clone(),
            labels: Some(labels),
            annotations: Some(annotations),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        type_: Some("kubernetes.io/dockerconfigjson".to_string()),
        data: Some(data),
        ..Default::default()
    };

    let already_exists = state
        .pull_secrets
        .iter()
        .any(|s| s.metadata.name.as_deref() == Some(expected_name.as_str()));

    if already_exists {
        Action::UpdateSecret(Box::new(secret))
    } else {
        Action::CreateSecret(Box::new(secret))
    }
}

fn annotation(secret: &Secret, key: &str) -> Option<String> {
    secret.metadata.annotations.as_ref()?.get(key).cloned()
}

fn parse_annotation_time(secret: &Secret, key: &str) -> Option<DateTime<Utc>> {
    let raw = annotation(secret, key)?;
    DateTime::parse_from_rfc3339(&raw).ok().map(|t| t.with_timezone(&Utc))
}

fn image_pull_secret_names(sa: &ServiceAccount) -> Vec<String> {
    sa.image_pull_secrets
        .as_ref()
        .map(|refs| refs.iter().filter_map(|r| r.name.clone()).collect())
        .unwrap_or_default()
}

/// Builds a [`ServiceAccountUpdate`] removing `expected_name`/`legacy_name`
/// from `sa`, or `None` if `sa` doesn't reference either.
fn remove_reference(sa: &ServiceAccount, expected_name: &str, legacy_name: &str) -> Option<ServiceAccountUpdate> {
    let current = image_pull_secret_names(sa);
    if !current.iter().any(|n| n == expected_name || n == legacy_name) {
        return None;
    }
    let reordered = reordered_pull_secrets(&current, None, None)
        .into_iter()
        .filter(|n| n != expected_name && n != legacy_name)
        .collect();
    Some(ServiceAccountUpdate {
        name: sa.metadata.name.clone().unwrap_or_default(),
        namespace: sa.metadata.namespace.clone().unwrap_or_default(),
        image_pull_secrets: reordered,
    })
}

/// Applies the ordering invariant (`spec.md` §3, §8): managed entries follow
/// unrelated ones; among managed entries, new-convention names precede
/// legacy-convention ones. `add` is appended if not already present, after
/// removing `remove` if given.
fn reordered_pull_secrets(current: &[String], add: Option<&str>, remove: Option<&str>) -> Vec<String> {
    let mut working: Vec<String> = current
        .iter()
        .filter(|n| match remove {
            Some(r) => n.as_str() != r,
            None => true,
        })
        .cloned()
        .collect();

    if let Some(add) = add {
        if !working.iter().any(|n| n == add) {
            working.push(add.to_string());
        }
    }

    let mut unrelated: Vec<String> = Vec::new();
    let mut current_convention: Vec<String> = Vec::new();
    let mut legacy_convention: Vec<String> = Vec::new();

    for name in working {
        if !naming::is_managed_secret_name(&name) {
            unrelated.push(name);
        } else if name.starts_with(crate::constants::SECRET_NAME_PREFIX) {
            current_convention.push(name);
        } else {
            legacy_convention.push(name);
        }
    }

    unrelated.extend(current_convention);
    unrelated.extend(legacy_convention);
    unrelated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorders_managed_after_unrelated_and_current_before_legacy() {
        let current = vec![
            "acr-pull-other-msi-acrpull-secret".to_string(),
            "unrelated-secret".to_string(),
            "acr-pull-other".to_string(),
        ];
        let result = reordered_pull_secrets(&current, Some("acr-pull-mine"), None);
        assert_eq!(
            result,
            vec![
                "unrelated-secret".to_string(),
                "acr-pull-other".to_string(),
                "acr-pull-mine".to_string(),
                "acr-pull-other-msi-acrpull-secret".to_string(),
            ]
        );
    }

    #[test]
    fn remove_drops_matching_entry_only() {
        let current = vec!["unrelated".to_string(), "acr-pull-mine".to_string()];
        let result = reordered_pull_secrets(&current, None, Some("acr-pull-mine"));
        assert_eq!(result, vec!["unrelated".to_string()]);
    }
}
