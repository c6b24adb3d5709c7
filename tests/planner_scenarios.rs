//! End-to-end planner scenarios (`spec.md` §8): each test builds an
//! [`ObservedState`] by hand and asserts the single [`Action`] the planner
//! derives from it, without touching a cluster.

use acrpull_controller::config::ControllerConfig;
use acrpull_controller::controller::binding::AcrBinding;
use acrpull_controller::controller::credential::MintedCredential;
use acrpull_controller::controller::planner::{finish_with_credential, plan, Action, ObservedState, PlanOutcome};
use acrpull_controller::crd::{
    AcrConfig, AcrPullBindingStatus, AcrPullBindingV1beta2, AcrPullBindingV1beta2Spec, AuthConfig,
    Environment, ManagedIdentityAuth,
};
use k8s_openapi::api::core::v1::{LocalObjectReference, Secret, ServiceAccount};
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

fn binding(name: &str, namespace: &str) -> AcrPullBindingV1beta2 {
    AcrPullBindingV1beta2 {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: AcrPullBindingV1beta2Spec {
            acr: AcrConfig {
                server: "myregistry.azurecr.io".to_string(),
                scope: "repository:my-app:pull".to_string(),
                environment: Environment::PublicCloud,
                cloud_config: None,
            },
            auth: AuthConfig::ManagedIdentity(ManagedIdentityAuth::ClientId("11111111-1111-1111-1111-111111111111".to_string())),
            service_account_name: "my-app".to_string(),
        },
        status: Some(AcrPullBindingStatus::default()),
    }
}

fn observed(binding: AcrPullBindingV1beta2) -> ObservedState<AcrPullBindingV1beta2> {
    ObservedState {
        binding,
        target_service_account: None,
        other_referencing_service_accounts: Vec::new(),
        pull_secrets: Vec::new(),
        now: chrono::Utc::now(),
        config: ControllerConfig::default(),
    }
}

#[test]
fn fresh_binding_gets_finalizer_before_anything_else() {
    let state = observed(binding("my-binding", "default"));
    match plan(&state) {
        PlanOutcome::Action(Action::UpdatePullBinding(updated)) => {
            assert!(updated.has_finalizer());
        }
        other => panic!("expected UpdatePullBinding adding a finalizer, got {other:?}"),
    }
}

#[test]
fn missing_service_account_reports_status_error() {
    let mut b = binding("my-binding", "default");
    b.metadata.finalizers = Some(vec![acrpull_controller::constants::FINALIZER.to_string()]);
    let state = observed(b);

    match plan(&state) {
        PlanOutcome::Action(Action::UpdatePullBindingStatus(status)) => {
            assert!(status.error.contains("my-app"));
        }
        other => panic!("expected a status error naming the missing service account, got {other:?}"),
    }
}

#[test]
fn missing_credential_requests_a_mint() {
    let mut b = binding("my-binding", "default");
    b.metadata.finalizers = Some(vec![acrpull_controller::constants::FINALIZER.to_string()]);
    let mut state = observed(b);
    state.target_service_account = Some(ServiceAccount {
        metadata: ObjectMeta {
            name: Some("my-app".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        ..Default::default()
    });

    match plan(&state) {
        PlanOutcome::NeedsCredential(request) => {
            assert_eq!(request.server, "myregistry.azurecr.io");
            assert_eq!(request.scope, "repository:my-app:pull");
        }
        other => panic!("expected a credential request, got an action instead: {other:?}"),
    }
}

#[test]
fn retarget_cleans_up_stale_service_account_before_anything_else() {
    let mut b = binding("my-binding", "default");
    b.metadata.finalizers = Some(vec![acrpull_controller::constants::FINALIZER.to_string()]);
    let mut state = observed(b);

    let stale_sa = ServiceAccount {
        metadata: ObjectMeta {
            name: Some("old-app".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        image_pull_secrets: Some(vec![LocalObjectReference {
            name: Some("acr-pull-my-binding".to_string()),
        }]),
        ..Default::default()
    };
    state.other_referencing_service_accounts = vec![stale_sa];
    state.target_service_account = Some(ServiceAccount {
        metadata: ObjectMeta {
            name: Some("my-app".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        ..Default::default()
    });

    match plan(&state) {
        PlanOutcome::Action(Action::UpdateServiceAccount(update)) => {
            assert_eq!(update.name, "old-app");
            assert!(!update.image_pull_secrets.iter().any(|n| n == "acr-pull-my-binding"));
        }
        other => panic!("expected retarget cleanup before anything else, got {other:?}"),
    }
}

#[test]
fn refresh_on_expiry_mints_and_updates_the_existing_secret() {
    let mut b = binding("my-binding", "default");
    b.metadata.finalizers = Some(vec![acrpull_controller::constants::FINALIZER.to_string()]);
    let config = ControllerConfig::default();
    assert_eq!(config.ttl_rotation_fraction, 0.5);

    let resolved_auth = b.auth(&config);
    let input_hash = b.input_hash(&config, &resolved_auth);
    let expected_name = b.pull_secret_name();

    let mut state = observed(b);
    state.config = config;
    state.target_service_account = Some(ServiceAccount {
        metadata: ObjectMeta {
            name: Some("my-app".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        image_pull_secrets: Some(vec![LocalObjectReference {
            name: Some(expected_name.clone()),
        }]),
        ..Default::default()
    });

    // Past the TTLRotationFraction=0.5 midpoint between refresh and expiry:
    // refreshed 90s ago, expiring in 60s, so the boundary (75s after refresh)
    // is 15s behind `now`.
    let refresh = state.now - chrono::Duration::seconds(90);
    let expiry = state.now + chrono::Duration::seconds(60);
    state.pull_secrets = vec![annotated_secret(&expected_name, &input_hash, refresh, expiry)];

    let request = match plan(&state) {
        PlanOutcome::NeedsCredential(request) => request,
        other => panic!("expected the expired secret to request a fresh credential, got an action instead: {other:?}"),
    };
    assert_eq!(request.server, "myregistry.azurecr.io");

    let minted = MintedCredential {
        refresh_token: "new-refresh-token".to_string(),
        expiry: state.now + chrono::Duration::hours(3),
    };
    match finish_with_credential(&state, Ok(minted)) {
        Action::UpdateSecret(updated) => {
            assert_eq!(updated.metadata.name.as_deref(), Some(expected_name.as_str()));
        }
        other => panic!("expected UpdateSecret for an already-existing pull secret, got {other:?}"),
    }
}

#[test]
fn service_account_attach_references_the_managed_secret() {
    let mut b = binding("my-binding", "default");
    b.metadata.finalizers = Some(vec![acrpull_controller::constants::FINALIZER.to_string()]);
    let config = ControllerConfig::default();
    let resolved_auth = b.auth(&config);
    let input_hash = b.input_hash(&config, &resolved_auth);
    let expected_name = b.pull_secret_name();

    let mut state = observed(b);
    state.config = config;
    state.target_service_account = Some(ServiceAccount {
        metadata: ObjectMeta {
            name: Some("my-app".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        image_pull_secrets: None,
        ..Default::default()
    });
    let refresh = state.now - chrono::Duration::minutes(30);
    let expiry = state.now + chrono::Duration::hours(2);
    state.pull_secrets = vec![annotated_secret(&expected_name, &input_hash, refresh, expiry)];

    match plan(&state) {
        PlanOutcome::Action(Action::UpdateServiceAccount(update)) => {
            assert_eq!(update.name, "my-app");
            assert!(update.image_pull_secrets.iter().any(|n| n == &expected_name));
        }
        other => panic!("expected the service account to be attached to the managed secret, got {other:?}"),
    }
}

#[test]
fn extraneous_secret_is_deleted_once_the_managed_one_is_current() {
    let mut b = binding("my-binding", "default");
    b.metadata.finalizers = Some(vec![acrpull_controller::constants::FINALIZER.to_string()]);
    let config = ControllerConfig::default();
    let resolved_auth = b.auth(&config);
    let input_hash = b.input_hash(&config, &resolved_auth);
    let expected_name = b.pull_secret_name();

    let mut state = observed(b);
    state.config = config;
    state.target_service_account = Some(ServiceAccount {
        metadata: ObjectMeta {
            name: Some("my-app".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        image_pull_secrets: Some(vec![LocalObjectReference {
            name: Some(expected_name.clone()),
        }]),
        ..Default::default()
    });
    let refresh = state.now - chrono::Duration::minutes(30);
    let expiry = state.now + chrono::Duration::hours(2);
    let current = annotated_secret(&expected_name, &input_hash, refresh, expiry);
    let legacy = Secret {
        metadata: ObjectMeta {
            name: Some("my-binding-msi-acrpull-secret".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    state.pull_secrets = vec![current, legacy];

    match plan(&state) {
        PlanOutcome::Action(Action::DeleteSecret { name, namespace }) => {
            assert_eq!(name, "my-binding-msi-acrpull-secret");
            assert_eq!(namespace, "default");
        }
        other => panic!("expected the extraneous legacy secret to be deleted, got {other:?}"),
    }
}

#[test]
fn status_sync_defaults_when_status_subresource_is_unset() {
    let mut b = binding("my-binding", "default");
    b.status = None;
    b.metadata.finalizers = Some(vec![acrpull_controller::constants::FINALIZER.to_string()]);
    let default_status = b.status();
    assert_eq!(default_status.last_token_refresh_time, None);
    assert_eq!(default_status.token_expiration_time, None);
    assert!(default_status.error.is_empty());

    let config = ControllerConfig::default();
    let resolved_auth = b.auth(&config);
    let input_hash = b.input_hash(&config, &resolved_auth);
    let expected_name = b.pull_secret_name();

    let mut state = observed(b);
    state.config = config;
    state.target_service_account = Some(ServiceAccount {
        metadata: ObjectMeta {
            name: Some("my-app".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        image_pull_secrets: Some(vec![LocalObjectReference {
            name: Some(expected_name.clone()),
        }]),
        ..Default::default()
    });
    let refresh = state.now - chrono::Duration::minutes(30);
    let expiry = state.now + chrono::Duration::hours(2);
    state.pull_secrets = vec![annotated_secret(&expected_name, &input_hash, refresh, expiry)];

    match plan(&state) {
        PlanOutcome::Action(Action::UpdatePullBindingStatus(status)) => {
            assert_eq!(status.token_expiration_time, Some(expiry));
            assert_eq!(status.last_token_refresh_time, Some(refresh));
        }
        other => panic!("expected a status sync populating the previously-unset status, got {other:?}"),
    }
}

fn annotated_secret(
    name: &str,
    input_hash: &str,
    refresh: chrono::DateTime<chrono::Utc>,
    expiry: chrono::DateTime<chrono::Utc>,
) -> Secret {
    let mut annotations = BTreeMap::new();
    annotations.insert(
        acrpull_controller::constants::ANNOTATION_TOKEN_INPUTS.to_string(),
        input_hash.to_string(),
    );
    annotations.insert(
        acrpull_controller::constants::ANNOTATION_TOKEN_REFRESH.to_string(),
        refresh.to_rfc3339(),
    );
    annotations.insert(
        acrpull_controller::constants::ANNOTATION_TOKEN_EXPIRY.to_string(),
        expiry.to_rfc3339(),
    );
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn terminating_binding_without_finalizer_is_a_noop() {
    let mut b = binding("my-binding", "default");
    b.metadata.deletion_timestamp = Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(chrono::Utc::now()));
    let state = observed(b);

    match plan(&state) {
        PlanOutcome::Action(Action::Nil) => {}
        other => panic!("expected Nil for a terminating binding with no finalizer, got {other:?}"),
    }
}
