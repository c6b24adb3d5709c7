//! Process-wide defaults, referenced by `config::controller` and the CLI.

/// Finalizer recorded on every ACRPullBinding this controller manages.
pub const FINALIZER: &str = "msi-acrpull.microsoft.com";

/// Label carrying the owning binding's name on a managed pull secret.
pub const BINDING_LABEL: &str = "binding";

/// Prefix for managed pull-secret names (current convention).
pub const SECRET_NAME_PREFIX: &str = "acr-pull-";

/// Suffix for legacy (v1beta1-era) pull-secret names.
pub const LEGACY_SECRET_SUFFIX: &str = "-msi-acrpull-secret";

/// Maximum length of a Kubernetes DNS-subdomain name.
pub const MAX_NAME_LENGTH: usize = 253;

/// Annotation holding the RFC3339 expiry of the minted ACR refresh token.
pub const ANNOTATION_TOKEN_EXPIRY: &str = "token.expiry";

/// Annotation holding the RFC3339 timestamp the token was last refreshed.
pub const ANNOTATION_TOKEN_REFRESH: &str = "token.refresh";

/// Annotation holding the Input Digest that produced the current secret value.
pub const ANNOTATION_TOKEN_INPUTS: &str = "token.inputs";

/// Fixed ACR docker-config username convention; must never be altered.
pub const ACR_DOCKER_CONFIG_USERNAME: &str = "00000000-0000-0000-0000-000000000000";

/// Fixed docker-config email convention.
pub const ACR_DOCKER_CONFIG_EMAIL: &str = "msi-acrpull@azurecr.io";

/// Default audience used to mint the projected service-account token presented to Entra.
pub const DEFAULT_SERVICE_ACCOUNT_TOKEN_AUDIENCE: &str = "api://AzureCRTokenExchange";

/// Default fraction of the `[refresh, expiry)` window at which v1beta2 bindings refresh.
pub const DEFAULT_TTL_ROTATION_FRACTION: f64 = 0.5;

/// v1beta1 refresh boundary: a fixed offset before expiry.
pub const V1BETA1_REFRESH_BEFORE_EXPIRY_SECS: i64 = 30 * 60;

/// Floor applied to every computed requeue delay.
pub const MIN_REQUEUE_SECS: u64 = 1;

/// Default reconciliation error requeue interval, mirrored from the base controller.
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 30;

/// Default Fibonacci backoff starting value (seconds), reusing the base controller's scale.
pub const DEFAULT_BACKOFF_START_SECS: u64 = 60;

/// Default Fibonacci backoff ceiling (seconds).
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 600;

/// Default watch-stream restart delay after an unclassified error (seconds).
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default watch-stream restart delay after the stream ends normally (seconds).
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Annotation/env var names used by the Azure workload-identity webhook convention.
pub const WORKLOAD_IDENTITY_TENANT_ID_ANNOTATION: &str = "azure.workload.identity/tenant-id";
pub const WORKLOAD_IDENTITY_CLIENT_ID_ANNOTATION: &str = "azure.workload.identity/client-id";
