//! Docker-config document rendering (`spec.md` §4.1).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::constants::{ACR_DOCKER_CONFIG_EMAIL, ACR_DOCKER_CONFIG_USERNAME};

#[derive(Serialize)]
struct DockerConfigJson {
    auths: BTreeMap<String, AuthEntry>,
}

#[derive(Serialize)]
struct AuthEntry {
    username: String,
    password: String,
    email: String,
    auth: String,
}

/// Renders the `.dockerconfigjson` document for `server`/`refresh_token`.
///
/// The username is the fixed zero-UUID ACR convention; it is never the
/// caller's identity and must not be altered.
pub fn render_docker_config(server: &str, refresh_token: &str) -> String {
    let auth = BASE64.encode(format!("{ACR_DOCKER_CONFIG_USERNAME}:{refresh_token}"));

    let mut auths = BTreeMap::new();
    auths.insert(
        server.to_string(),
        AuthEntry {
            username: ACR_DOCKER_CONFIG_USERNAME.to_string(),
            password: refresh_token.to_string(),
            email: ACR_DOCKER_CONFIG_EMAIL.to_string(),
            auth,
        },
    );

    serde_json::to_string(&DockerConfigJson { auths })
        .expect("docker config document is always serializable")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_expected_shape() {
        let doc = render_docker_config("myregistry.azurecr.io", "sometoken");
        let parsed: serde_json::Value = serde_json::from_str(&doc).unwrap();
        let entry = &parsed["auths"]["myregistry.azurecr.io"];
        assert_eq!(entry["username"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(entry["password"], "sometoken");
        assert_eq!(entry["email"], "msi-acrpull@azurecr.io");
        let expected_auth =
            BASE64.encode("00000000-0000-0000-0000-000000000000:sometoken");
        assert_eq!(entry["auth"], expected_auth);
    }
}
