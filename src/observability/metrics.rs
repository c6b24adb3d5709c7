//! Prometheus metrics for monitoring reconciliation and credential
//! acquisition.
//!
//! ## Metrics Exposed
//!
//! - `acrpull_reconciliations_total`
//! - `acrpull_reconciliation_errors_total`
//! - `acrpull_reconciliation_duration_seconds`
//! - `acrpull_credential_acquisitions_total`
//! - `acrpull_credential_acquisition_errors_total`
//! - `acrpull_secrets_managed`
//! - `acrpull_requeues_total{reason}`
//! - `acrpull_legacy_migrated_total`

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "acrpull_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "acrpull_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "acrpull_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static CREDENTIAL_ACQUISITIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "acrpull_credential_acquisitions_total",
        "Total number of Entra/ACR credential acquisitions attempted",
    )
    .expect("Failed to create CREDENTIAL_ACQUISITIONS_TOTAL metric - this should never happen")
});

static CREDENTIAL_ACQUISITION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "acrpull_credential_acquisition_errors_total",
        "Total number of failed Entra/ACR credential acquisitions",
    )
    .expect(
        "Failed to create CREDENTIAL_ACQUISITION_ERRORS_TOTAL metric - this should never happen",
    )
});

static SECRETS_MANAGED: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "acrpull_secrets_managed",
        "Current number of pull secrets being managed",
    )
    .expect("Failed to create SECRETS_MANAGED metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("acrpull_requeues_total", "Total number of requeues by reason"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static LEGACY_MIGRATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "acrpull_legacy_migrated_total",
        "Total number of legacy-named secrets labeled by the migration controller",
    )
    .expect("Failed to create LEGACY_MIGRATED_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CREDENTIAL_ACQUISITIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CREDENTIAL_ACQUISITION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_MANAGED.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LEGACY_MIGRATED_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(seconds: f64) {
    RECONCILIATION_DURATION.observe(seconds);
}

pub fn increment_credential_acquisitions() {
    CREDENTIAL_ACQUISITIONS_TOTAL.inc();
}

pub fn increment_credential_acquisition_errors() {
    CREDENTIAL_ACQUISITION_ERRORS_TOTAL.inc();
}

pub fn set_secrets_managed(count: i64) {
    SECRETS_MANAGED.set(count);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_legacy_migrated() {
    LEGACY_MIGRATED_TOTAL.inc();
}

pub(crate) fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        assert!(register_metrics().is_ok());
        increment_reconciliations();
        increment_reconciliation_errors();
        observe_reconciliation_duration(0.1);
        increment_credential_acquisitions();
        increment_credential_acquisition_errors();
        set_secrets_managed(3);
        increment_requeues_total("noop");
        increment_legacy_migrated();
    }
}
