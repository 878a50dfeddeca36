//! Tenant access token for the chat platform's open API.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: Option<String>,
}

/// Fetch a fresh tenant access token. Tokens are short-lived; callers fetch
/// one per operation rather than caching across commands.
pub async fn tenant_access_token(
    client: &reqwest::Client,
    api_base: &str,
    app_id: &str,
    app_secret: &str,
) -> anyhow::Result<String> {
    let url = format!("{api_base}/open-apis/auth/v3/tenant_access_token/internal");
    let resp: TokenResponse = client
        .post(&url)
        .json(&serde_json::json!({ "app_id": app_id, "app_secret": app_secret }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if resp.code != 0 {
        anyhow::bail!("token request failed: {} (code {})", resp.msg, resp.code);
    }
    resp.tenant_access_token
        .ok_or_else(|| anyhow::anyhow!("token response missing tenant_access_token"))
}
