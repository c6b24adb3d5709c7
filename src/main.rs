//! ACRPullBinding controller entry point.

use acrpull_controller::controller::migration;
use acrpull_controller::crd::{AcrPullBindingV1beta1, AcrPullBindingV1beta2};
use acrpull_controller::runtime::{initialization, watch_loop};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let init = initialization::initialize().await?;

    if migration::should_run(&init.client).await.unwrap_or(false) {
        info!("unlabeled legacy secrets found, starting migration watchdog");
        tokio::spawn(run_migration_watchdog(init.client.clone()));
    }

    let v1beta1 = watch_loop::run_watch_loop::<AcrPullBindingV1beta1>(
        init.v1beta1,
        init.secrets.clone(),
        init.service_accounts.clone(),
        init.ctx.clone(),
        init.server_state.clone(),
        init.config.clone(),
    );
    let v1beta2 = watch_loop::run_watch_loop::<AcrPullBindingV1beta2>(
        init.v1beta2,
        init.secrets,
        init.service_accounts,
        init.ctx,
        init.server_state,
        init.config,
    );

    tokio::join!(v1beta1, v1beta2);

    info!("controller stopped");
    Ok(())
}

/// Legacy Migration Controller (C7, `spec.md` §4.6), completion half: each
/// binding's own reconcile labels its legacy secret (`controller::reconcile`);
/// this watchdog only watches for every legacy secret becoming labeled and
/// then exits the process, per §4.6 step 2 — the next start picks up the
/// label-selected Secret watch (§4.5).
async fn run_migration_watchdog(client: kube::Client) {
    let poll_interval = std::time::Duration::from_secs(60);
    loop {
        tokio::time::sleep(poll_interval).await;
        match migration::check_completion(&client).await {
            Ok(true) => {
                info!("legacy migration complete, exiting to pick up the label-selected secret watch");
                std::process::exit(0);
            }
            Ok(false) => {}
            Err(e) => warn!("failed to check legacy migration status: {e}"),
        }
    }
}
