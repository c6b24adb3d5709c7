//! Entra (Azure AD) token acquisition: managed-identity and federated
//! workload-identity variants (`spec.md` §4.1 step 1).

use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_identity::{ManagedIdentityCredential, ManagedIdentityCredentialOptions, UserAssignedId};
use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use kube::api::{Api, PostParams};
use tracing::{info_span, Instrument};

use crate::constants::{
    WORKLOAD_IDENTITY_CLIENT_ID_ANNOTATION, WORKLOAD_IDENTITY_TENANT_ID_ANNOTATION,
};
use crate::controller::binding::ResolvedAuth;

use super::acr::exchange_refresh_token;
use super::{CredentialAcquirer, CredentialError, CredentialRequest, MintedCredential};

const DEFAULT_ENTRA_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const DEFAULT_RESOURCE_MANAGER_AUDIENCE: &str = "https://management.azure.com/";

/// Production [`CredentialAcquirer`]: talks to real Entra and ACR endpoints.
pub struct AzureCredentialAcquirer {
    k8s_client: kube::Client,
    http_client: reqwest::Client,
}

impl AzureCredentialAcquirer {
    pub fn new(k8s_client: kube::Client) -> Self {
        Self {
            k8s_client,
            http_client: reqwest::Client::new(),
        }
    }

    /// Returns `(entra access token, tenant id, "" if unknown as with managed identity)`.
    async fn acquire_entra_token(
        &self,
        request: &CredentialRequest,
    ) -> Result<(String, String), CredentialError> {
        let audience = request
            .cloud_config
            .as_ref()
            .map(|c| c.resource_manager_audience.clone())
            .unwrap_or_else(|| DEFAULT_RESOURCE_MANAGER_AUDIENCE.to_string());

        match &request.auth {
            ResolvedAuth::ManagedIdentity {
                client_id,
                resource_id,
            } => self
                .acquire_via_managed_identity(client_id.as_deref(), resource_id.as_deref(), &audience)
                .await
                .map(|token| (token, String::new()))
                .map_err(|e| CredentialError::EntraToken(e.to_string())),
            ResolvedAuth::WorkloadIdentity {
                service_account_ref,
                client_id,
                tenant_id,
            } => self
                .acquire_via_workload_identity(
                    request,
                    service_account_ref.as_deref(),
                    client_id.as_deref(),
                    tenant_id.as_deref(),
                    &audience,
                )
                .await
                .map_err(|e| CredentialError::EntraToken(e.to_string())),
        }
    }

    async fn acquire_via_managed_identity(
        &self,
        client_id: Option<&str>,
        resource_id: Option<&str>,
        audience: &str,
    ) -> anyhow::Result<String> {
        let mut options = ManagedIdentityCredentialOptions::default();
        if let Some(client_id) = client_id {
            options.user_assigned_id = Some(UserAssignedId::ClientId(client_id.to_string()));
        } else if let Some(resource_id) = resource_id {
            options.user_assigned_id = Some(UserAssignedId::ResourceId(resource_id.to_string()));
        }

        let credential = ManagedIdentityCredential::new(Some(options))?;
        let scopes = [format!("{}.default", trim_trailing_slash(audience))];
        let token = credential.get_token(&scopes, None).await?;
        Ok(token.token.secret().to_string())
    }

    async fn acquire_via_workload_identity(
        &self,
        request: &CredentialRequest,
        service_account_ref: Option<&str>,
        client_id: Option<&str>,
        tenant_id: Option<&str>,
        audience: &str,
    ) -> anyhow::Result<(String, String)> {
        let sa_name = service_account_ref
            .ok_or_else(|| anyhow::anyhow!("workload identity requires a service account reference"))?;

        let sas: Api<k8s_openapi::api::core::v1::ServiceAccount> =
            Api::namespaced(self.k8s_client.clone(), &request.namespace);
        let sa = sas.get(sa_name).await?;

        let (tenant_id, client_id) = match (tenant_id, client_id) {
            (Some(t), Some(c)) => (t.to_string(), c.to_string()),
            (None, None) => {
                let annotations = sa.metadata.annotations.unwrap_or_default();
                let tenant = annotations
                    .get(WORKLOAD_IDENTITY_TENANT_ID_ANNOTATION)
                    .cloned()
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "service account {sa_name} missing {WORKLOAD_IDENTITY_TENANT_ID_ANNOTATION}"
                        )
                    })?;
                let client = annotations
                    .get(WORKLOAD_IDENTITY_CLIENT_ID_ANNOTATION)
                    .cloned()
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "service account {sa_name} missing {WORKLOAD_IDENTITY_CLIENT_ID_ANNOTATION}"
                        )
                    })?;
                (tenant, client)
            }
            _ => anyhow::bail!("clientID and tenantID must be both set or both absent"),
        };

        let sa_token = self
            .mint_service_account_token(sa_name, &request.namespace, &request.service_account_token_audience)
            .await?;

        let authority_host = request
            .cloud_config
            .as_ref()
            .map(|c| c.entra_authority_host.clone())
            .unwrap_or_else(|| DEFAULT_ENTRA_AUTHORITY_HOST.to_string());

        let token_url = format!("{}/{}/oauth2/v2.0/token", trim_trailing_slash(&authority_host), tenant_id);
        let scope = format!("{}.default", trim_trailing_slash(audience));

        let response = self
            .http_client
            .post(&token_url)
            .form(&[
                ("client_id", client_id.as_str()),
                ("scope", scope.as_str()),
                (
                    "client_assertion_type",
                    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
                ),
                ("client_assertion", sa_token.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Entra token endpoint returned {status}: {body}");
        }

        #[derive(serde::Deserialize)]
        struct TokenResponse {
            access_token: String,
        }
        let parsed: TokenResponse = response.json().await?;
        Ok((parsed.access_token, tenant_id))
    }

    async fn mint_service_account_token(
        &self,
        sa_name: &str,
        namespace: &str,
        audience: &str,
    ) -> anyhow::Result<String> {
        let sas: Api<k8s_openapi::api::core::v1::ServiceAccount> =
            Api::namespaced(self.k8s_client.clone(), namespace);
        let request = TokenRequest {
            spec: TokenRequestSpec {
                audiences: vec![audience.to_string()],
                expiration_seconds: Some(600),
                ..Default::default()
            },
            ..Default::default()
        };
        let response: TokenRequest = sas
            .create_subresource("token", sa_name, &PostParams::default(), serde_json::to_vec(&request)?)
            .await?;
        response
            .status
            .ok_or_else(|| anyhow::anyhow!("TokenRequest for {sa_name} returned no status"))
            .map(|s| s.token)
    }
}

fn trim_trailing_slash(s: &str) -> &str {
    s.trim_end_matches('/')
}

#[async_trait]
impl CredentialAcquirer for AzureCredentialAcquirer {
    async fn acquire(&self, request: &CredentialRequest) -> Result<MintedCredential, CredentialError> {
        let span = info_span!("acr.entra_token", acr.server = %request.server);
        let (entra_token, tenant_id) = self.acquire_entra_token(request).instrument(span).await?;

        let span = info_span!("acr.refresh_token_exchange", acr.server = %request.server);
        exchange_refresh_token(&self.http_client, &request.server, &tenant_id, &entra_token)
            .instrument(span)
            .await
            .map_err(|e| CredentialError::AcrExchange(e.to_string()))
    }
}
