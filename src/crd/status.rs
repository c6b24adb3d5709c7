//! Status shared by both ACRPullBinding versions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcrPullBindingStatus {
    /// RFC3339 timestamp of the last successful credential refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_token_refresh_time: Option<DateTime<Utc>>,
    /// RFC3339 timestamp the current pull secret's token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiration_time: Option<DateTime<Utc>>,
    /// Human-readable error; empty on success.
    #[serde(default)]
    pub error: String,
}

impl AcrPullBindingStatus {
    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }

    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            last_token_refresh_time: None,
            token_expiration_time: None,
            error: message.into(),
        }
    }
}
