//! Error handling and backoff for the controller watch loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kube_runtime::controller::Action as RequeueAction;
use tracing::{error, info, warn};

use crate::controller::binding::AcrBinding;
use crate::controller::reconcile::{BackoffState, ReconcileContext, ReconcilerError};
use crate::observability::metrics;

/// Fibonacci backoff per resource, keyed by `namespace/name`, so one
/// misbehaving binding's retry schedule never affects another's
/// (`spec.md` §7 "Programmer errors... fail fast", transient errors retry).
pub fn handle_reconciliation_error<B: AcrBinding>(
    obj: Arc<B>,
    error: &ReconcilerError,
    ctx: Arc<ReconcileContext>,
) -> RequeueAction {
    let name = obj.meta().name.clone().unwrap_or_default();
    let namespace = obj.meta().namespace.clone().unwrap_or_default();

    let span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %name,
        resource.namespace = %namespace,
        error = %error,
    );
    let _guard = span.enter();

    error!("reconciliation error for {namespace}/{name}: {error}");
    metrics::increment_reconciliation_errors();

    let resource_key = format!("{namespace}/{name}");
    let backoff_seconds = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(resource_key)
                .or_insert_with(|| BackoffState::new(&ctx.config));
            state.error_count += 1;
            state.backoff.next_backoff_seconds()
        }
        Err(e) => {
            warn!("failed to lock backoff_states: {e}, using default backoff");
            ctx.config.backoff_start_secs
        }
    };

    info!("retrying {namespace}/{name} with Fibonacci backoff: {backoff_seconds}s");
    metrics::increment_requeues_total("error-backoff");
    RequeueAction::requeue(std::time::Duration::from_secs(backoff_seconds))
}

/// Classifies a watch-stream error and applies the matching delay.
/// Returns `true` to continue (event was benign), `false` to let the
/// caller drop the event and allow the watch to restart.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff_ms: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> bool {
    let span = tracing::span!(tracing::Level::WARN, "controller.watch.error", error = %error_string);
    let _guard = span.enter();

    let is_not_found = error_string.contains("404") || error_string.contains("not found");
    let is_401 = (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Gone");
    let is_429 = error_string.contains("429") || error_string.contains("TooManyRequests");

    if is_401 {
        error!("watch authentication failed (401) - RBAC may have been revoked or token expired");
        tokio::time::sleep(std::time::Duration::from_secs(watch_restart_delay_secs)).await;
        false
    } else if is_410 {
        warn!("watch resource version expired (410), restarting watch");
        false
    } else if is_429 {
        let current = backoff_ms.load(Ordering::Relaxed);
        warn!("API server storage reinitializing (429), backing off {current}ms");
        tokio::time::sleep(std::time::Duration::from_millis(current)).await;
        backoff_ms.store((current * 2).min(max_backoff_ms), Ordering::Relaxed);
        false
    } else if is_not_found {
        warn!("resource not found (404), this is expected for deleted resources");
        true
    } else {
        error!("controller watch stream error: {error_string}");
        tokio::time::sleep(std::time::Duration::from_secs(watch_restart_delay_secs)).await;
        false
    }
}
