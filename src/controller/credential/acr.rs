//! ACR refresh-token exchange (`spec.md` §4.1 step 2): the only direct,
//! unauthenticated-by-SDK REST call this controller makes, following the
//! base controller's idiom of a direct bearer-token `reqwest` call against a
//! cloud REST endpoint rather than a generated SDK client.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::MintedCredential;

#[derive(Deserialize)]
struct AcrExchangeResponse {
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Default ACR refresh-token lifetime when the exchange response omits
/// `expires_in` (ACR tokens are typically valid for three hours).
const DEFAULT_ACR_TOKEN_LIFETIME_SECS: i64 = 3 * 60 * 60;

pub async fn exchange_refresh_token(
    http_client: &reqwest::Client,
    server: &str,
    tenant_id: &str,
    entra_token: &str,
) -> anyhow::Result<MintedCredential> {
    let url = format!("https://{server}/oauth2/exchange");
    let response = http_client
        .post(&url)
        .form(&[
            ("grant_type", "access_token"),
            ("service", server),
            ("tenant", tenant_id),
            ("access_token", entra_token),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("ACR exchange at {url} returned {status}: {body}");
    }

    let parsed: AcrExchangeResponse = response.json().await?;
    let lifetime = parsed.expires_in.unwrap_or(DEFAULT_ACR_TOKEN_LIFETIME_SECS);
    let expiry: DateTime<Utc> = Utc::now() + chrono::Duration::seconds(lifetime);

    Ok(MintedCredential {
        refresh_token: parsed.refresh_token,
        expiry,
    })
}
