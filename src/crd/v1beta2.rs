//! Current (storage) ACRPullBinding CRD (v1beta2).
//!
//! Strongly-typed, validated fields per `spec.md` §6. Cross-field rules that
//! a Kubernetes structural schema cannot express (the `AirgappedCloud` ⇔
//! `cloudConfig` pairing) are checked by [`AcrConfig::validate`] — the
//! enforcement point of record is the cluster admission policy (§1, out of
//! scope), this is a testable mirror of that contract.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{AuthConfig, CloudConfig, Environment};
use super::status::AcrPullBindingStatus;

/// ACR target: server, scope, environment, and optional sovereign-cloud config.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcrConfig {
    /// FQDN of the ACR server, e.g. `myregistry.azurecr.io`.
    pub server: String,
    /// Non-empty registry scope string. No wildcards.
    #[schemars(length(min = 1))]
    pub scope: String,
    /// Azure cloud environment.
    pub environment: Environment,
    /// Required iff `environment == AirgappedCloud`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_config: Option<CloudConfig>,
}

impl AcrConfig {
    /// `spec.md` §3/§6: `cloudConfig` present iff `environment == AirgappedCloud`.
    pub fn validate(&self) -> Result<(), String> {
        match (self.environment, &self.cloud_config) {
            (Environment::AirgappedCloud, None) => {
                Err("cloudConfig is required when environment is AirgappedCloud".to_string())
            }
            (env, Some(_)) if env != Environment::AirgappedCloud => Err(
                "cloudConfig must be omitted unless environment is AirgappedCloud".to_string(),
            ),
            _ => Ok(()),
        }
    }
}

/// # Example
/// ```yaml
/// apiVersion: msi-acrpull.microsoft.com/v1beta2
/// kind: AcrPullBinding
/// metadata:
///   name: my-binding
/// spec:
///   acr:
///     server: myregistry.azurecr.io
///     scope: "repository:my-app:pull"
///     environment: PublicCloud
///   auth:
///     workloadIdentity: {}
///   serviceAccountName: my-app
/// ```
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    kind = "AcrPullBinding",
    group = "msi-acrpull.microsoft.com",
    version = "v1beta2",
    namespaced,
    status = "AcrPullBindingStatus",
    shortname = "acrpull",
    printcolumn = r#"{"name":"Server", "type":"string", "jsonPath":".spec.acr.server"}, {"name":"Error", "type":"string", "jsonPath":".status.error"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AcrPullBindingV1beta2Spec {
    pub acr: AcrConfig,
    pub auth: AuthConfig,
    /// Target service account. Required; immutable is enforced by the
    /// admission policy, not this schema.
    pub service_account_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn airgapped_requires_cloud_config() {
        let base = AcrConfig {
            server: "x.azurecr.io".into(),
            scope: "repository:x:pull".into(),
            environment: Environment::AirgappedCloud,
            cloud_config: None,
        };
        assert!(base.validate().is_err());
    }

    #[test]
    fn public_cloud_rejects_cloud_config() {
        let base = AcrConfig {
            server: "x.azurecr.io".into(),
            scope: "repository:x:pull".into(),
            environment: Environment::PublicCloud,
            cloud_config: Some(CloudConfig {
                entra_authority_host: "login.microsoftonline.com".into(),
                resource_manager_audience: "https://management.azure.com/".into(),
            }),
        };
        assert!(base.validate().is_err());
    }
}
