use std::collections::HashMap;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use tracing::info;

/// Fetches a named secret from the vault and returns its key-value payload.
/// Called once per secret at startup; the process never re-reads secrets.
pub async fn fetch_secret(
    client: &Client,
    api_url: &str,
    vault_token: &str,
    name: &str,
) -> Result<HashMap<String, String>> {
    let url = format!("{}/v1/secret/data/{}", api_url, name);
    info!("Fetching secret '{}' from vault", name);

    let response = client
        .get(&url)
        .header("X-Vault-Token", vault_token)
        .header("Accept", "application/json")
        .send()
        .await?;

    let status = response.status();
    let response_text = response.text().await?;
    if !status.is_success() {
        return Err(anyhow::anyhow!(
            "Vault error {} fetching secret '{}'",
            status,
            name
        ));
    }

    let body: Value = serde_json::from_str(&response_text)?;
    let data = body["data"]["data"]
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("Secret '{}' has no data payload", name))?;

    let mut secret = HashMap::new();
    for (key, value) in data {
        if let Some(s) = value.as_str() {
            secret.insert(key.clone(), s.to_string());
        }
    }

    info!("Secret '{}' loaded ({} keys)", name, secret.len());
    Ok(secret)
}

pub fn required_key(secret: &HashMap<String, String>, key: &str, name: &str) -> Result<String> {
    secret
        .get(key)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Secret '{}' is missing key '{}'", name, key))
}
