//! Process bootstrap: rustls, tracing, metrics, HTTP server, Kubernetes
//! client, and reconciliation of pre-existing bindings before the watch
//! loop starts (`SPEC_FULL.md` §B.1).

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::api::{Api, ListParams};
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{ControllerConfig, SharedControllerConfig};
use crate::controller::binding::AcrBinding;
use crate::controller::credential::AzureCredentialAcquirer;
use crate::controller::reconcile::{reconcile, ReconcileContext};
use crate::crd::{AcrPullBindingV1beta1, AcrPullBindingV1beta2};
use crate::observability;
use crate::server::{start_server, ServerState};

pub struct InitializationResult {
    pub client: Client,
    pub v1beta1: Api<AcrPullBindingV1beta1>,
    pub v1beta2: Api<AcrPullBindingV1beta2>,
    pub secrets: Api<Secret>,
    pub service_accounts: Api<ServiceAccount>,
    pub ctx: Arc<ReconcileContext>,
    pub server_state: Arc<ServerState>,
    pub config: SharedControllerConfig,
}

pub async fn initialize() -> Result<InitializationResult> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("failed to install rustls crypto provider"));

    let config = ControllerConfig::from_cli();
    config.validate().context("invalid controller configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("starting ACRPullBinding controller");
    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_state_clone = server_state.clone();
    let bind_address = config.metrics_bind_address.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(&bind_address, server_state_clone).await {
            error!("HTTP server error: {e}");
        }
    });
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default().await?;
    let config: SharedControllerConfig = Arc::new(config);

    let v1beta1: Api<AcrPullBindingV1beta1> = Api::all(client.clone());
    let v1beta2: Api<AcrPullBindingV1beta2> = Api::all(client.clone());
    let secrets: Api<Secret> = Api::all(client.clone());
    let service_accounts: Api<ServiceAccount> = Api::all(client.clone());

    let ctx = Arc::new(ReconcileContext::new(
        client.clone(),
        Arc::new(AzureCredentialAcquirer::new(client.clone())),
        config.clone(),
    ));

    reconcile_existing(&v1beta1, &ctx).await;
    reconcile_existing(&v1beta2, &ctx).await;

    server_state.is_ready.store(true, Ordering::Relaxed);
    info!("controller initialized, starting watch loops");

    Ok(InitializationResult {
        client,
        v1beta1,
        v1beta2,
        secrets,
        service_accounts,
        ctx,
        server_state,
        config,
    })
}

async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = std::time::Duration::from_secs(30);
    let poll_interval = std::time::Duration::from_millis(100);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            anyhow::bail!("HTTP server failed to start");
        }
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            anyhow::bail!("HTTP server failed to become ready within {startup_timeout:?}");
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// §B.1: reconciles every existing binding once before the watch loop
/// starts, so bindings created while the controller was down aren't
/// stranded until their next unrelated event.
async fn reconcile_existing<B: AcrBinding>(api: &Api<B>, ctx: &Arc<ReconcileContext>) {
    let span = tracing::span!(tracing::Level::INFO, "controller.startup.reconcile_existing");
    let _guard = span.enter();

    match api.list(&ListParams::default()).await {
        Ok(list) => {
            info!("reconciling {} existing bindings", list.items.len());
            for item in list.items {
                let name = item.meta().name.clone().unwrap_or_default();
                let namespace = item.meta().namespace.clone().unwrap_or_default();
                if let Err(e) = reconcile(Arc::new(item), ctx.clone()).await {
                    warn!(resource.name = %name, resource.namespace = %namespace, error = %e, "startup reconciliation failed");
                }
            }
        }
        Err(e) => {
            warn!("CRD not queryable at startup, continuing: {e}");
        }
    }
}
