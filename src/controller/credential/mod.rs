//! Credential Acquirer (C1): Azure Entra token → ACR refresh-token exchange
//! → docker-config document (`spec.md` §4.1).

mod acr;
mod docker_config;
mod entra;

pub use docker_config::render_docker_config;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::crd::{CloudConfig, Environment};

use crate::controller::binding::ResolvedAuth;

/// Everything the acquirer needs to mint a credential for one binding.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    pub server: String,
    pub scope: String,
    pub environment: Environment,
    pub cloud_config: Option<CloudConfig>,
    pub auth: ResolvedAuth,
    pub namespace: String,
    pub service_account_token_audience: String,
}

#[derive(Debug, Clone)]
pub struct MintedCredential {
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to retrieve ACR audience Entra token: {0}")]
    EntraToken(String),
    #[error("failed to retrieve ACR token: {0}")]
    AcrExchange(String),
}

/// The two-step exchange, abstracted behind a trait so the planner's caller
/// can be tested against a fake without real Azure/ACR network access.
#[async_trait]
pub trait CredentialAcquirer: Send + Sync {
    async fn acquire(&self, request: &CredentialRequest) -> Result<MintedCredential, CredentialError>;
}

pub use entra::AzureCredentialAcquirer;
