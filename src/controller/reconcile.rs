//! Wires the planner (C4), credential acquirer (C1), and action executor
//! (C5) into the async function `kube_runtime::Controller::run` drives.

use kube::Client;
use kube_runtime::controller::Action as RequeueAction;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, info_span, warn};
use tracing::Instrument;

use crate::config::SharedControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::binding::AcrBinding;
use crate::controller::credential::{CredentialAcquirer, CredentialError};
use crate::controller::executor::{self, ExecutorError};
use crate::controller::migration::{self, MigrationOutcome};
use crate::controller::planner::{plan, Action, ObservedState, PlanOutcome};
use crate::observability::metrics;

/// Per-resource Fibonacci backoff state, keyed by `namespace/name`
/// (`runtime::error_policy`).
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(config: &crate::config::ControllerConfig) -> Self {
        Self {
            backoff: FibonacciBackoff::new(config.backoff_start_secs, config.backoff_max_secs),
            error_count: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("kubernetes API error: {0}")]
    Kubernetes(#[from] ExecutorError),
    #[error("failed to look up observed state: {0}")]
    Observation(#[from] kube::Error),
}

/// Context shared by every reconcile invocation, analogous to the base
/// controller's `Reconciler`.
pub struct ReconcileContext {
    pub client: Client,
    pub credential_acquirer: Arc<dyn CredentialAcquirer>,
    pub config: SharedControllerConfig,
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl ReconcileContext {
    pub fn new(
        client: Client,
        credential_acquirer: Arc<dyn CredentialAcquirer>,
        config: SharedControllerConfig,
    ) -> Self {
        Self {
            client,
            credential_acquirer,
            config,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }
}

impl std::fmt::Debug for ReconcileContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileContext").finish_non_exhaustive()
    }
}

/// The generic reconcile function, identical for both CRD versions; the
/// concrete binding type `B` is supplied by each watch loop.
pub async fn reconcile<B: AcrBinding>(
    obj: Arc<B>,
    ctx: Arc<ReconcileContext>,
) -> Result<RequeueAction, ReconcilerError> {
    let name = obj.meta().name.clone().unwrap_or_default();
    let namespace = obj.meta().namespace.clone().unwrap_or_default();

    let span = info_span!(
        "controller.watch.reconcile",
        resource.name = %name,
        resource.namespace = %namespace,
        resource.kind = "ACRPullBinding",
    );
    let _guard = span.enter();

    let started = std::time::Instant::now();
    let result = reconcile_inner(&obj, &namespace, &name, &ctx).await;
    metrics::observe_reconciliation_duration(started.elapsed().as_secs_f64());
    metrics::increment_reconciliations();

    match &result {
        Ok(requeue) => info!(?requeue, "reconcile.complete"),
        Err(e) => {
            error!(error = %e, "reconcile.failed");
            metrics::increment_reconciliation_errors();
        }
    }
    result
}

async fn reconcile_inner<B: AcrBinding>(
    obj: &Arc<B>,
    namespace: &str,
    name: &str,
    ctx: &ReconcileContext,
) -> Result<RequeueAction, ReconcilerError> {
    match migration::migrate_binding(&ctx.client, obj.as_ref()).await {
        Ok(MigrationOutcome::Labeled) => {
            info!("labeled legacy secret for {namespace}/{name}");
            metrics::increment_legacy_migrated();
        }
        Ok(MigrationOutcome::Continue) => {}
        Err(e) => warn!(error = %e, "legacy secret migration check failed for {namespace}/{name}"),
    }

    let observed = observe::<B>(obj, namespace, ctx).await?;

    let action = match plan(&observed) {
        PlanOutcome::Action(action) => action,
        PlanOutcome::NeedsCredential(request) => {
            let span = info_span!("acr.credential_acquisition", acr.server = %request.server);
            let result = ctx
                .credential_acquirer
                .acquire(&request)
                .instrument(span)
                .await;
            if let Err(CredentialError::EntraToken(ref e) | CredentialError::AcrExchange(ref e)) = result {
                warn!(error = %e, "credential acquisition failed");
                metrics::increment_credential_acquisition_errors();
            } else {
                metrics::increment_credential_acquisitions();
            }
            crate::controller::planner::finish_with_credential(&observed, result)
        }
    };

    let requeue = requeue_hint(&observed, &action);

    let span = info_span!("k8s.write", action.kind = action_kind(&action));
    executor::execute(&ctx.client, namespace, name, action)
        .instrument(span)
        .await?;

    Ok(requeue)
}

async fn observe<B: AcrBinding>(
    obj: &Arc<B>,
    namespace: &str,
    ctx: &ReconcileContext,
) -> Result<ObservedState<B>, ReconcilerError> {
    use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
    use kube::api::{Api, ListParams};

    let binding = obj.as_ref().clone();
    let sa_name = binding.service_account_name();

    let sas: Api<ServiceAccount> = Api::namespaced(ctx.client.clone(), namespace);
    let target_service_account = sas.get_opt(&sa_name).await?;

    let expected_name = binding.pull_secret_name();
    let all_sas = sas.list(&ListParams::default()).await?;
    let other_referencing_service_accounts = all_sas
        .items
        .into_iter()
        .filter(|sa| sa.metadata.name.as_deref() != Some(sa_name.as_str()))
        .filter(|sa| {
            sa.image_pull_secrets
                .as_ref()
                .is_some_and(|refs| refs.iter().any(|r| r.name.as_deref() == Some(expected_name.as_str())))
        })
        .collect();

    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), namespace);
    let legacy_name = crate::controller::naming::legacy_secret_name(binding.meta().name.as_deref().unwrap_or_default());
    let mut pull_secrets = Vec::new();
    if let Some(s) = secrets.get_opt(&expected_name).await? {
        pull_secrets.push(s);
    }
    if legacy_name != expected_name {
        if let Some(s) = secrets.get_opt(&legacy_name).await? {
            pull_secrets.push(s);
        }
    }

    Ok(ObservedState {
        binding,
        target_service_account,
        other_referencing_service_accounts,
        pull_secrets,
        now: chrono::Utc::now(),
        config: (*ctx.config).clone(),
    })
}

fn requeue_hint<B: AcrBinding>(observed: &ObservedState<B>, action: &Action<B>) -> RequeueAction {
    match action {
        Action::UpdatePullBindingStatus(_) | Action::Noop => {
            match (
                observed.pull_secrets.first().and_then(|s| {
                    s.metadata
                        .annotations
                        .as_ref()
                        .and_then(|a| a.get(crate::constants::ANNOTATION_TOKEN_EXPIRY))
                }),
                observed.pull_secrets.first().and_then(|s| {
                    s.metadata
                        .annotations
                        .as_ref()
                        .and_then(|a| a.get(crate::constants::ANNOTATION_TOKEN_REFRESH))
                }),
            ) {
                (Some(expiry), Some(refresh)) => {
                    match (
                        chrono::DateTime::parse_from_rfc3339(refresh),
                        chrono::DateTime::parse_from_rfc3339(expiry),
                    ) {
                        (Ok(refresh), Ok(expiry)) => {
                            let boundary = observed.binding.refresh_boundary(
                                refresh.with_timezone(&chrono::Utc),
                                expiry.with_timezone(&chrono::Utc),
                                &observed.config,
                            );
                            RequeueAction::requeue(executor::requeue_after(boundary, observed.now))
                        }
                        _ => RequeueAction::requeue(Duration::from_secs(crate::constants::MIN_REQUEUE_SECS)),
                    }
                }
                _ => RequeueAction::requeue(Duration::from_secs(crate::constants::MIN_REQUEUE_SECS)),
            }
        }
        _ => RequeueAction::await_change(),
    }
}

fn action_kind<B>(action: &Action<B>) -> &'static str {
    match action {
        Action::UpdatePullBinding(_) => "updatePullBinding",
        Action::UpdatePullBindingStatus(_) => "updatePullBindingStatus",
        Action::Noop => "noop",
        Action::CreateSecret(_) => "createSecret",
        Action::UpdateSecret(_) => "updateSecret",
        Action::DeleteSecret { .. } => "deleteSecret",
        Action::UpdateServiceAccount(_) => "updateServiceAccount",
        Action::Nil => "nil",
    }
}
