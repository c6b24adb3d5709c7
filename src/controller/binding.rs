//! C8 / §4.7: a trait unifying the v1beta1 and v1beta2 ACRPullBinding kinds
//! so the planner and executor are written once, generic over the concrete
//! binding type — dynamic dispatch across CRD versions realized as a trait
//! parameterized by the concrete binding type, not runtime reflection.

use chrono::{DateTime, Utc};
use kube::Resource;

use crate::config::ControllerConfig;
use crate::constants::{FINALIZER, V1BETA1_REFRESH_BEFORE_EXPIRY_SECS};
use crate::crd::{
    AcrPullBindingStatus, AcrPullBindingV1beta1, AcrPullBindingV1beta2, CloudConfig, Environment,
};
use crate::crd::{AuthConfig, ManagedIdentityAuth};
use crate::controller::naming;

/// Identity the binding authenticates as, resolved from either CRD shape
/// into one uniform representation.
#[derive(Debug, Clone)]
pub enum ResolvedAuth {
    ManagedIdentity {
        client_id: Option<String>,
        resource_id: Option<String>,
    },
    WorkloadIdentity {
        service_account_ref: Option<String>,
        client_id: Option<String>,
        tenant_id: Option<String>,
    },
}

/// The generic reconciler interface (§4.7), implemented once per CRD version.
pub trait AcrBinding: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    fn has_finalizer(&self) -> bool {
        self.meta()
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|s| s == FINALIZER))
    }

    fn add_finalizer(&mut self) {
        let finalizers = self.meta_mut().finalizers.get_or_insert_with(Vec::new);
        if !finalizers.iter().any(|s| s == FINALIZER) {
            finalizers.push(FINALIZER.to_string());
        }
    }

    fn remove_finalizer(&mut self) {
        if let Some(finalizers) = self.meta_mut().finalizers.as_mut() {
            finalizers.retain(|s| s != FINALIZER);
        }
    }

    /// Effective target service-account name (§3: "default if empty" for v1beta1).
    fn service_account_name(&self) -> String;

    fn pull_secret_name(&self) -> String {
        naming::secret_name(self.meta().name.as_deref().unwrap_or_default())
    }

    fn acr_server(&self, config: &ControllerConfig) -> Option<String>;
    fn acr_scope(&self) -> Option<String>;
    fn environment(&self) -> Environment;
    fn cloud_config(&self) -> Option<CloudConfig>;
    fn auth(&self, config: &ControllerConfig) -> ResolvedAuth;

    fn input_hash(&self, config: &ControllerConfig, resolved: &ResolvedAuth) -> String;

    /// Refresh boundary (§4.3 step 5): v1beta1 uses a fixed offset before
    /// expiry; v1beta2 uses a configurable fraction of `[refresh, expiry)`.
    fn refresh_boundary(
        &self,
        refresh: DateTime<Utc>,
        expiry: DateTime<Utc>,
        config: &ControllerConfig,
    ) -> DateTime<Utc>;

    /// The status subresource, or its default (empty) value before the
    /// controller's first `UpdatePullBindingStatus` write — `status` is an
    /// `Option` on every generated CRD type and is `None` on a freshly
    /// observed binding.
    fn status(&self) -> AcrPullBindingStatus;
    fn set_status(&mut self, status: AcrPullBindingStatus);
}

fn normalize_resource_id(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let mut cleaned = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for c in raw.chars() {
        if c == '/' {
            if !last_was_sep {
                cleaned.push(c);
            }
            last_was_sep = true;
        } else {
            cleaned.push(c);
            last_was_sep = false;
        }
    }
    if cleaned.ends_with('/') {
        cleaned.pop();
    }
    if cleaned.is_empty() || cleaned == "." {
        None
    } else {
        Some(cleaned)
    }
}

impl AcrBinding for AcrPullBindingV1beta1 {
    fn service_account_name(&self) -> String {
        self.spec.effective_service_account_name().to_string()
    }

    fn acr_server(&self, config: &ControllerConfig) -> Option<String> {
        self.spec
            .acr_server
            .clone()
            .or_else(|| config.acr_server.clone())
    }

    fn acr_scope(&self) -> Option<String> {
        self.spec.scope.clone()
    }

    fn environment(&self) -> Environment {
        Environment::PublicCloud
    }

    fn cloud_config(&self) -> Option<CloudConfig> {
        None
    }

    fn auth(&self, config: &ControllerConfig) -> ResolvedAuth {
        let client_id = self
            .spec
            .managed_identity_client_id
            .clone()
            .or_else(|| config.managed_identity_client_id.clone());
        let resource_id = normalize_resource_id(
            self.spec
                .managed_identity_resource_id
                .as_deref()
                .or(config.managed_identity_resource_id.as_deref()),
        );
        ResolvedAuth::ManagedIdentity {
            client_id,
            resource_id,
        }
    }

    fn input_hash(&self, _config: &ControllerConfig, resolved: &ResolvedAuth) -> String {
        let (client_id, resource_id) = match resolved {
            ResolvedAuth::ManagedIdentity {
                client_id,
                resource_id,
            } => (
                client_id.clone().unwrap_or_default(),
                resource_id.clone().unwrap_or_default(),
            ),
            ResolvedAuth::WorkloadIdentity { .. } => (String::new(), String::new()),
        };
        crate::controller::digest::input_digest(&crate::controller::digest::v1beta1_inputs(
            &client_id,
            &resource_id,
            self.spec.acr_server.as_deref().unwrap_or_default(),
            self.spec.scope.as_deref().unwrap_or_default(),
        ))
    }

    fn refresh_boundary(
        &self,
        _refresh: DateTime<Utc>,
        expiry: DateTime<Utc>,
        _config: &ControllerConfig,
    ) -> DateTime<Utc> {
        expiry - chrono::Duration::seconds(V1BETA1_REFRESH_BEFORE_EXPIRY_SECS)
    }

    fn status(&self) -> AcrPullBindingStatus {
        self.status.clone().unwrap_or_default()
    }

    fn set_status(&mut self, status: AcrPullBindingStatus) {
        self.status = Some(status);
    }
}

impl AcrBinding for AcrPullBindingV1beta2 {
    fn service_account_name(&self) -> String {
        self.spec.service_account_name.clone()
    }

    fn acr_server(&self, _config: &ControllerConfig) -> Option<String> {
        Some(self.spec.acr.server.clone())
    }

    fn acr_scope(&self) -> Option<String> {
        Some(self.spec.acr.scope.clone())
    }

    fn environment(&self) -> Environment {
        self.spec.acr.environment
    }

    fn cloud_config(&self) -> Option<CloudConfig> {
        self.spec.acr.cloud_config.clone()
    }

    fn auth(&self, _config: &ControllerConfig) -> ResolvedAuth {
        match &self.spec.auth {
            AuthConfig::ManagedIdentity(ManagedIdentityAuth::ClientId(id)) => {
                ResolvedAuth::ManagedIdentity {
                    client_id: Some(id.clone()),
                    resource_id: None,
                }
            }
            AuthConfig::ManagedIdentity(ManagedIdentityAuth::ResourceId(id)) => {
                ResolvedAuth::ManagedIdentity {
                    client_id: None,
                    resource_id: normalize_resource_id(Some(id)),
                }
            }
            AuthConfig::WorkloadIdentity(wi) => ResolvedAuth::WorkloadIdentity {
                service_account_ref: wi
                    .service_account_ref
                    .clone()
                    .or_else(|| Some(self.spec.service_account_name.clone())),
                client_id: wi.client_id.clone(),
                tenant_id: wi.tenant_id.clone(),
            },
        }
    }

    fn input_hash(&self, _config: &ControllerConfig, resolved: &ResolvedAuth) -> String {
        let env = self.spec.acr.environment.as_str();
        let server = &self.spec.acr.server;
        let scope = &self.spec.acr.scope;
        let sa = &self.spec.service_account_name;
        let raw = match resolved {
            ResolvedAuth::ManagedIdentity {
                client_id,
                resource_id,
            } => crate::controller::digest::v1beta2_managed_identity_inputs(
                sa,
                resource_id.as_deref().unwrap_or_default(),
                client_id.as_deref().unwrap_or_default(),
                env,
                server,
                scope,
            ),
            ResolvedAuth::WorkloadIdentity {
                service_account_ref,
                ..
            } => crate::controller::digest::v1beta2_workload_identity_inputs(
                sa,
                service_account_ref.as_deref().unwrap_or_default(),
                env,
                server,
                scope,
            ),
        };
        crate::controller::digest::input_digest(&raw)
    }

    fn refresh_boundary(
        &self,
        refresh: DateTime<Utc>,
        expiry: DateTime<Utc>,
        config: &ControllerConfig,
    ) -> DateTime<Utc> {
        let window = expiry - refresh;
        let fraction_secs = (window.num_milliseconds() as f64 * config.ttl_rotation_fraction) as i64;
        refresh + chrono::Duration::milliseconds(fraction_secs)
    }

    fn status(&self) -> AcrPullBindingStatus {
        self.status.clone().unwrap_or_default()
    }

    fn set_status(&mut self, status: AcrPullBindingStatus) {
        self.status = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_normalization_collapses_separators_and_trailing_slash() {
        assert_eq!(
            normalize_resource_id(Some("/sub//rg//id/")),
            Some("/sub/rg/id".to_string())
        );
        assert_eq!(normalize_resource_id(Some(".")), None);
        assert_eq!(normalize_resource_id(None), None);
    }
}
