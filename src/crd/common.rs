//! Schema types shared between the v1beta1 and v1beta2 ACRPullBinding specs.

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Azure cloud environment a binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    PublicCloud,
    #[serde(rename = "USGovernmentCloud")]
    UsGovernmentCloud,
    ChinaCloud,
    AirgappedCloud,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicCloud => "PublicCloud",
            Self::UsGovernmentCloud => "USGovernmentCloud",
            Self::ChinaCloud => "ChinaCloud",
            Self::AirgappedCloud => "AirgappedCloud",
        }
    }
}

impl JsonSchema for Environment {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("Environment")
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let schema_value = serde_json::json!({
            "type": "string",
            "enum": ["PublicCloud", "USGovernmentCloud", "ChinaCloud", "AirgappedCloud"],
            "description": "Azure cloud environment the binding targets."
        });
        Schema::try_from(schema_value).expect("Failed to create Schema for Environment")
    }
}

/// Required companion configuration when `environment = AirgappedCloud`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudConfig {
    /// Entra authority host for the sovereign/airgapped cloud.
    pub entra_authority_host: String,
    /// Audience used when requesting the ARM-scoped Entra token.
    pub resource_manager_audience: String,
}

/// Auth method: exactly one of managed identity or federated workload identity.
///
/// Modeled as a hand-rolled oneOf, mirroring the base controller's
/// `ProviderConfig` enum: a Kubernetes structural schema cannot express
/// "exactly one of these keys" any other way, and a derived `#[serde(untagged)]`
/// enum would silently accept zero or both keys being set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthConfig {
    ManagedIdentity(ManagedIdentityAuth),
    WorkloadIdentity(WorkloadIdentityAuth),
}

impl<'de> Deserialize<'de> for AuthConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AuthConfigVisitor;

        impl<'de> Visitor<'de> for AuthConfigVisitor {
            type Value = AuthConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with exactly one of `managedIdentity` or `workloadIdentity`")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut managed_identity: Option<ManagedIdentityAuth> = None;
                let mut workload_identity: Option<WorkloadIdentityAuth> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "managedIdentity" => {
                            if managed_identity.is_some() {
                                return Err(de::Error::duplicate_field("managedIdentity"));
                            }
                            managed_identity = Some(map.next_value()?);
                        }
                        "workloadIdentity" => {
                            if workload_identity.is_some() {
                                return Err(de::Error::duplicate_field("workloadIdentity"));
                            }
                            workload_identity = Some(map.next_value()?);
                        }
                        other => {
                            return Err(de::Error::unknown_field(
                                other,
                                &["managedIdentity", "workloadIdentity"],
                            ));
                        }
                    }
                }

                match (managed_identity, workload_identity) {
                    (Some(m), None) => Ok(AuthConfig::ManagedIdentity(m)),
                    (None, Some(w)) => Ok(AuthConfig::WorkloadIdentity(w)),
                    (None, None) => Err(de::Error::custom(
                        "exactly one of `managedIdentity` or `workloadIdentity` is required",
                    )),
                    (Some(_), Some(_)) => Err(de::Error::custom(
                        "only one of `managedIdentity` or `workloadIdentity` may be set",
                    )),
                }
            }
        }

        deserializer.deserialize_map(AuthConfigVisitor)
    }
}

impl JsonSchema for AuthConfig {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("AuthConfig")
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        let managed = serde_json::to_value(generator.subschema_for::<ManagedIdentityAuth>())
            .expect("ManagedIdentityAuth schema must serialize");
        let workload = serde_json::to_value(generator.subschema_for::<WorkloadIdentityAuth>())
            .expect("WorkloadIdentityAuth schema must serialize");
        let schema_value = serde_json::json!({
            "type": "object",
            "oneOf": [
                {"required": ["managedIdentity"], "properties": {"managedIdentity": managed}},
                {"required": ["workloadIdentity"], "properties": {"workloadIdentity": workload}},
            ],
            "description": "Exactly one of managedIdentity or workloadIdentity."
        });
        Schema::try_from(schema_value).expect("Failed to create Schema for AuthConfig")
    }
}

/// Managed-identity auth: exactly one of `clientID` or `resourceID`.
#[derive(Debug, Clone, Serialize)]
pub enum ManagedIdentityAuth {
    #[serde(rename = "clientID")]
    ClientId(String),
    #[serde(rename = "resourceID")]
    ResourceId(String),
}

impl<'de> Deserialize<'de> for ManagedIdentityAuth {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ManagedIdentityVisitor;

        impl<'de> Visitor<'de> for ManagedIdentityVisitor {
            type Value = ManagedIdentityAuth;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with exactly one of `clientID` or `resourceID`")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut client_id: Option<String> = None;
                let mut resource_id: Option<String> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "clientID" => {
                            if client_id.is_some() {
                                return Err(de::Error::duplicate_field("clientID"));
                            }
                            client_id = Some(map.next_value()?);
                        }
                        "resourceID" => {
                            if resource_id.is_some() {
                                return Err(de::Error::duplicate_field("resourceID"));
                            }
                            resource_id = Some(map.next_value()?);
                        }
                        other => {
                            return Err(de::Error::unknown_field(
                                other,
                                &["clientID", "resourceID"],
                            ));
                        }
                    }
                }

                match (client_id, resource_id) {
                    (Some(c), None) => Ok(ManagedIdentityAuth::ClientId(c)),
                    (None, Some(r)) => Ok(ManagedIdentityAuth::ResourceId(r)),
                    (None, None) => Err(de::Error::custom(
                        "exactly one of `clientID` or `resourceID` is required",
                    )),
                    (Some(_), Some(_)) => Err(de::Error::custom(
                        "only one of `clientID` or `resourceID` may be set",
                    )),
                }
            }
        }

        deserializer.deserialize_map(ManagedIdentityVisitor)
    }
}

impl JsonSchema for ManagedIdentityAuth {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("ManagedIdentityAuth")
    }

    // Flat object schema rather than a nested oneOf, to avoid the nullable-field
    // issues a oneOf-of-single-property-objects produces under Kubernetes'
    // structural schema validation.
    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let schema_value = serde_json::json!({
            "type": "object",
            "properties": {
                "clientID": {"type": "string"},
                "resourceID": {"type": "string"}
            },
            "description": "Exactly one of clientID or resourceID."
        });
        Schema::try_from(schema_value).expect("Failed to create Schema for ManagedIdentityAuth")
    }
}

/// Federated workload-identity auth.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadIdentityAuth {
    /// Service account the federated identity is attached to. Defaults to the
    /// binding's `serviceAccountName` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_ref: Option<String>,
    /// Entra client ID. Must be set together with `tenantID` or not at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Entra tenant ID. Must be set together with `clientID` or not at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl WorkloadIdentityAuth {
    /// `spec.md` §3: `(clientID, tenantID)` must be both set or neither.
    pub fn validate(&self) -> Result<(), String> {
        match (&self.client_id, &self.tenant_id) {
            (Some(_), Some(_)) | (None, None) => Ok(()),
            _ => Err("clientID and tenantID must be both set or both absent".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_identity_requires_exactly_one_field() {
        let client_only: ManagedIdentityAuth =
            serde_json::from_value(serde_json::json!({"clientID": "abc"})).unwrap();
        assert!(matches!(client_only, ManagedIdentityAuth::ClientId(ref s) if s == "abc"));

        let neither: Result<ManagedIdentityAuth, _> = serde_json::from_value(serde_json::json!({}));
        assert!(neither.is_err());

        let both: Result<ManagedIdentityAuth, _> =
            serde_json::from_value(serde_json::json!({"clientID": "a", "resourceID": "b"}));
        assert!(both.is_err());
    }

    #[test]
    fn auth_config_requires_exactly_one_variant() {
        let wi: AuthConfig = serde_json::from_value(serde_json::json!({
            "workloadIdentity": {}
        }))
        .unwrap();
        assert!(matches!(wi, AuthConfig::WorkloadIdentity(_)));

        let both: Result<AuthConfig, _> = serde_json::from_value(serde_json::json!({
            "managedIdentity": {"clientID": "a"},
            "workloadIdentity": {}
        }));
        assert!(both.is_err());
    }

    #[test]
    fn workload_identity_both_or_neither() {
        let neither = WorkloadIdentityAuth {
            service_account_ref: None,
            client_id: None,
            tenant_id: None,
        };
        assert!(neither.validate().is_ok());

        let only_client = WorkloadIdentityAuth {
            service_account_ref: None,
            client_id: Some("c".into()),
            tenant_id: None,
        };
        assert!(only_client.validate().is_err());
    }
}
