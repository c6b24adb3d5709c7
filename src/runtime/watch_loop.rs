//! Generic controller watch loop (`spec.md` §4.5), instantiated once per
//! ACRPullBinding version so both CRD shapes share one `reconcile<B>`.

use futures::StreamExt;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::api::Api;
use kube_runtime::{watcher, Controller};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SharedControllerConfig;
use crate::constants::BINDING_LABEL;
use crate::controller::binding::AcrBinding;
use crate::controller::migration;
use crate::controller::reconcile::{reconcile, ReconcileContext};
use crate::controller::watch::{map_secret_to_binding, map_service_account_to_bindings};
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::server::ServerState;

pub async fn run_watch_loop<B: AcrBinding>(
    bindings: Api<B>,
    secrets: Api<Secret>,
    service_accounts: Api<ServiceAccount>,
    ctx: Arc<ReconcileContext>,
    server_state: Arc<ServerState>,
    config: SharedControllerConfig,
) {
    loop {
        if !server_state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
            info!("shutdown requested, exiting watch loop");
            break;
        }

        let backoff_ms = Arc::new(AtomicU64::new(config.backoff_start_secs * 1000));

        let bindings_watch_config = match &config.label_selector {
            Some(selector) => watcher::Config::default().labels(selector),
            None => watcher::Config::default(),
        };
        let controller = Controller::new(bindings.clone(), bindings_watch_config);
        let store = controller.store();

        // §4.5: until the legacy migration has completed, the Secret watch
        // observes everything so unlabeled legacy secrets are still seen by
        // the migration path; once it's done, it narrows to managed secrets.
        let secrets_watch_config = if migration::check_completion(&ctx.client).await.unwrap_or(false) {
            watcher::Config::default().labels(BINDING_LABEL)
        } else {
            watcher::Config::default()
        };

        let controller = controller
            .shutdown_on_signal()
            .watches(secrets.clone(), secrets_watch_config, |secret: Secret| {
                map_secret_to_binding::<B>(&secret)
            })
            .watches(service_accounts.clone(), watcher::Config::default(), move |sa: ServiceAccount| {
                map_service_account_to_bindings(&store, &sa)
            })
            .run(reconcile::<B>, handle_reconciliation_error::<B>, ctx.clone())
            .filter_map(|result| {
                let backoff_ms = backoff_ms.clone();
                let config = config.clone();
                async move {
                    match result {
                        Ok(_) => {
                            debug!("watch.event.success");
                            Some(result)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            if handle_watch_stream_error(
                                &error_string,
                                &backoff_ms,
                                config.backoff_max_secs * 1000,
                                config.watch_restart_delay_secs,
                            )
                            .await
                            {
                                Some(result)
                            } else {
                                None
                            }
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()));

        controller.await;

        if !server_state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
            break;
        }

        warn!(
            "controller watch stream ended, restarting in {}s",
            config.watch_restart_delay_after_end_secs
        );
        tokio::time::sleep(std::time::Duration::from_secs(config.watch_restart_delay_after_end_secs)).await;
    }
}
