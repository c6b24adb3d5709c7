//! Legacy ACRPullBinding CRD (v1beta1).
//!
//! Flat, loosely-typed fields, each falling back to a process-level default
//! (`spec.md` §3, §6) when omitted. A webhook (out of scope here, per §1)
//! forbids changing `serviceAccountName` after creation.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::status::AcrPullBindingStatus;

/// # Example
/// ```yaml
/// apiVersion: msi-acrpull.microsoft.com/v1beta1
/// kind: AcrPullBinding
/// metadata:
///   name: my-binding
/// spec:
///   acrServer: myregistry.azurecr.io
///   scope: repository:my-app:pull
///   managedIdentityClientID: 11111111-2222-3333-4444-555555555555
///   serviceAccountName: my-app
/// ```
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    kind = "AcrPullBinding",
    group = "msi-acrpull.microsoft.com",
    version = "v1beta1",
    namespaced,
    status = "AcrPullBindingStatus",
    shortname = "acrpull",
    printcolumn = r#"{"name":"Server", "type":"string", "jsonPath":".spec.acrServer"}, {"name":"Error", "type":"string", "jsonPath":".status.error"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AcrPullBindingV1beta1Spec {
    /// ACR server FQDN. Defaults to the `ACR_SERVER` env var when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acr_server: Option<String>,
    /// Registry scope string, e.g. `repository:my-app:pull`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Managed-identity client ID. Defaults to `MANAGED_IDENTITY_CLIENT_ID`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_identity_client_id: Option<String>,
    /// Managed-identity resource ID. Defaults to `MANAGED_IDENTITY_RESOURCE_ID`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_identity_resource_id: Option<String>,
    /// Target service account; effective name defaults to `default` when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

impl AcrPullBindingV1beta1Spec {
    pub fn effective_service_account_name(&self) -> &str {
        match self.service_account_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "default",
        }
    }
}
