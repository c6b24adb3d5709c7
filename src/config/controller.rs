//! Controller-level settings: CLI flags layered over environment variables.
//!
//! Flags and env vars both come from `spec.md` §6 "Process configuration".
//! CLI flags take precedence, then environment variables, then built-in
//! defaults — the same precedence order the base controller's
//! `ControllerConfig::from_env` plus flag layering uses.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_START_SECS, DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
    DEFAULT_SERVICE_ACCOUNT_TOKEN_AUDIENCE, DEFAULT_TTL_ROTATION_FRACTION,
    DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
};

pub type SharedControllerConfig = Arc<ControllerConfig>;

/// CLI flags, each readable from the matching environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "acrpull-controller", about = "ACRPullBinding controller")]
pub struct Cli {
    /// Address the Prometheus `/metrics` endpoint binds to.
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    pub metrics_bind_address: String,

    /// Address the `/healthz` and `/readyz` probes bind to.
    #[arg(long, env = "HEALTH_PROBE_BIND_ADDRESS", default_value = "0.0.0.0:8081")]
    pub health_probe_bind_address: String,

    /// Enable leader election so only one replica reconciles at a time.
    #[arg(long, env = "LEADER_ELECT", default_value_t = false)]
    pub leader_elect: bool,

    /// Audience requested when minting the projected service-account token
    /// presented to Entra for workload-identity federation.
    #[arg(
        long,
        env = "SERVICE_ACCOUNT_TOKEN_AUDIENCE",
        default_value = DEFAULT_SERVICE_ACCOUNT_TOKEN_AUDIENCE
    )]
    pub service_account_token_audience: String,

    /// Fraction of the `[refresh, expiry)` window at which a v1beta2 binding
    /// is considered due for refresh. Must satisfy `0 < x < 1`.
    #[arg(long, env = "TTL_ROTATION_FRACTION", default_value_t = DEFAULT_TTL_ROTATION_FRACTION)]
    pub ttl_rotation_fraction: f64,

    /// Label selector narrowing which ACRPullBindings this process watches.
    #[arg(long, env = "LABEL_SELECTOR")]
    pub label_selector: Option<String>,

    /// v1beta1 default ACR server, used when a binding omits `acrServer`.
    #[arg(long, env = "ACR_SERVER")]
    pub acr_server: Option<String>,

    /// v1beta1 default managed-identity resource ID.
    #[arg(long, env = "MANAGED_IDENTITY_RESOURCE_ID")]
    pub managed_identity_resource_id: Option<String>,

    /// v1beta1 default managed-identity client ID.
    #[arg(long, env = "MANAGED_IDENTITY_CLIENT_ID")]
    pub managed_identity_client_id: Option<String>,

    /// Global log level (error, warn, info, debug, trace).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Fully resolved controller configuration, built from [`Cli`] plus
/// ambient defaults not exposed as flags.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub metrics_bind_address: String,
    pub health_probe_bind_address: String,
    pub leader_elect: bool,
    pub service_account_token_audience: String,
    pub ttl_rotation_fraction: f64,
    pub label_selector: Option<String>,
    pub acr_server: Option<String>,
    pub managed_identity_resource_id: Option<String>,
    pub managed_identity_client_id: Option<String>,
    pub log_level: String,
    pub reconciliation_error_requeue_secs: u64,
    pub backoff_start_secs: u64,
    pub backoff_max_secs: u64,
    pub watch_restart_delay_secs: u64,
    pub watch_restart_delay_after_end_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_bind_address: "0.0.0.0:8080".to_string(),
            health_probe_bind_address: "0.0.0.0:8081".to_string(),
            leader_elect: false,
            service_account_token_audience: DEFAULT_SERVICE_ACCOUNT_TOKEN_AUDIENCE.to_string(),
            ttl_rotation_fraction: DEFAULT_TTL_ROTATION_FRACTION,
            label_selector: None,
            acr_server: None,
            managed_identity_resource_id: None,
            managed_identity_client_id: None,
            log_level: "info".to_string(),
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            backoff_start_secs: DEFAULT_BACKOFF_START_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
        }
    }
}

impl ControllerConfig {
    /// Parse CLI flags (and their backing env vars) and merge with ambient
    /// defaults for settings that have no flag.
    pub fn from_cli() -> Self {
        let cli = Cli::parse();
        Self::from(cli)
    }

    /// Validate cross-cutting invariants not expressible in `clap`'s own
    /// validators (e.g. the open interval on `ttl_rotation_fraction`).
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.ttl_rotation_fraction > 0.0 && self.ttl_rotation_fraction < 1.0) {
            anyhow::bail!(
                "ttl-rotation-fraction must satisfy 0 < x < 1, got {}",
                self.ttl_rotation_fraction
            );
        }
        Ok(())
    }

    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_secs(self.backoff_start_secs)
    }

    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

impl From<Cli> for ControllerConfig {
    fn from(cli: Cli) -> Self {
        let defaults = Self::default();
        Self {
            metrics_bind_address: cli.metrics_bind_address,
            health_probe_bind_address: cli.health_probe_bind_address,
            leader_elect: cli.leader_elect,
            service_account_token_audience: cli.service_account_token_audience,
            ttl_rotation_fraction: cli.ttl_rotation_fraction,
            label_selector: cli.label_selector,
            acr_server: cli.acr_server,
            managed_identity_resource_id: cli.managed_identity_resource_id,
            managed_identity_client_id: cli.managed_identity_client_id,
            log_level: cli.log_level,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_fraction_out_of_range() {
        let mut cfg = ControllerConfig::default();
        cfg.ttl_rotation_fraction = 0.0;
        assert!(cfg.validate().is_err());
        cfg.ttl_rotation_fraction = 1.0;
        assert!(cfg.validate().is_err());
        cfg.ttl_rotation_fraction = 0.5;
        assert!(cfg.validate().is_ok());
    }
}
