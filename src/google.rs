use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Provider wiring: base URL plus the service-account bearer token pulled from
/// the vault at startup.
#[derive(Clone)]
pub struct GoogleConfig {
    pub api_url: String,
    pub token: String,
}

const MAX_ATTEMPTS: u32 = 3;

/// Makes an authenticated request to the Google API, retrying transient
/// failures (transport errors, timeouts, 429, 5xx) with jittered backoff.
/// Other error statuses fail the operation immediately.
async fn request_with_retry(
    client: &Client,
    cfg: &GoogleConfig,
    method: Method,
    url: &str,
    body: Option<Value>,
    operation: &str,
) -> Result<String> {
    let mut attempt = 1;
    loop {
        debug!("Google {} request to: {}", operation, url);
        let mut req = client
            .request(method.clone(), url)
            .header("Authorization", format!("Bearer {}", cfg.token))
            .header("Accept", "application/json");
        if let Some(ref body) = body {
            req = req.json(body);
        }

        match req.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let response_text = response.text().await?;
                    debug!(
                        "Google {} response received ({} chars)",
                        operation,
                        response_text.len()
                    );
                    return Ok(response_text);
                }

                let response_text = response.text().await.unwrap_or_default();
                let transient =
                    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
                if !transient || attempt >= MAX_ATTEMPTS {
                    error!("Google {} API error {}: {}", operation, status, response_text);
                    return Err(anyhow::anyhow!(
                        "Google API error {}: {}",
                        status,
                        response_text
                    ));
                }
                warn!(
                    "Google {} attempt {} returned {}, retrying",
                    operation, attempt, status
                );
            }
            Err(e) => {
                if !(e.is_connect() || e.is_timeout()) || attempt >= MAX_ATTEMPTS {
                    error!("Google {} request failed: {}", operation, e);
                    return Err(e.into());
                }
                warn!("Google {} attempt {} failed: {}, retrying", operation, attempt, e);
            }
        }

        let jitter: u64 = rand::thread_rng().gen_range(0..100);
        let delay = Duration::from_millis(200u64 * (1 << (attempt - 1)) + jitter);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

async fn create_permission(
    client: &Client,
    cfg: &GoogleConfig,
    file_id: &str,
    permission: Value,
) -> Result<()> {
    let url = format!("{}/v3/files/{}/permissions", cfg.api_url, file_id);
    request_with_retry(client, cfg, Method::POST, &url, Some(permission), "permission").await?;
    Ok(())
}

/// Anyone may view the sheet; the given user may edit it.
pub async fn set_sheet_permissions(
    client: &Client,
    cfg: &GoogleConfig,
    file_id: &str,
    user_email: &str,
) -> Result<()> {
    create_permission(
        client,
        cfg,
        file_id,
        serde_json::json!({ "type": "anyone", "role": "reader" }),
    )
    .await?;

    create_permission(
        client,
        cfg,
        file_id,
        serde_json::json!({ "type": "user", "role": "writer", "emailAddress": user_email }),
    )
    .await
}

/// Forms stay private; only the given user may edit.
pub async fn set_form_permissions(
    client: &Client,
    cfg: &GoogleConfig,
    form_id: &str,
    user_email: &str,
) -> Result<()> {
    create_permission(
        client,
        cfg,
        form_id,
        serde_json::json!({ "type": "user", "role": "writer", "emailAddress": user_email }),
    )
    .await
}

pub async fn create_sheet(
    client: &Client,
    cfg: &GoogleConfig,
    title: &str,
    user_email: &str,
) -> Result<String> {
    let url = format!("{}/v4/spreadsheets", cfg.api_url);
    let payload = serde_json::json!({ "properties": { "title": title } });

    info!("Creating spreadsheet '{}'", title);
    let response_text =
        request_with_retry(client, cfg, Method::POST, &url, Some(payload), "create_sheet").await?;

    let body: Value = serde_json::from_str(&response_text)?;
    let sheet_id = body["spreadsheetId"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Spreadsheet response has no id"))?
        .to_string();

    set_sheet_permissions(client, cfg, &sheet_id, user_email).await?;
    info!("Spreadsheet {} created", sheet_id);
    Ok(sheet_id)
}

pub async fn create_form(
    client: &Client,
    cfg: &GoogleConfig,
    title: &str,
    user_email: &str,
) -> Result<String> {
    let url = format!("{}/v1/forms", cfg.api_url);
    let payload = serde_json::json!({
        "info": {
            "title": title,
            "documentTitle": title
        }
    });

    info!("Creating form '{}'", title);
    let response_text =
        request_with_retry(client, cfg, Method::POST, &url, Some(payload), "create_form").await?;

    let body: Value = serde_json::from_str(&response_text)?;
    let form_id = body["formId"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Form response has no id"))?
        .to_string();

    // The sign-up form needs the two identifying questions before it is shared
    let batch_url = format!("{}/v1/forms/{}:batchUpdate", cfg.api_url, form_id);
    let questions = serde_json::json!({
        "requests": [
            {
                "createItem": {
                    "item": {
                        "title": "Game Name",
                        "questionItem": {
                            "question": {
                                "required": true,
                                "textQuestion": { "paragraph": false }
                            }
                        }
                    },
                    "location": { "index": 0 }
                }
            },
            {
                "createItem": {
                    "item": {
                        "title": "Tag Line",
                        "questionItem": {
                            "question": {
                                "required": true,
                                "textQuestion": { "paragraph": false }
                            }
                        }
                    },
                    "location": { "index": 1 }
                }
            }
        ]
    });
    request_with_retry(client, cfg, Method::POST, &batch_url, Some(questions), "form_questions")
        .await?;

    set_form_permissions(client, cfg, &form_id, user_email).await?;

    info!("Form {} created", form_id);
    Ok(form_id)
}

pub async fn delete_document(client: &Client, cfg: &GoogleConfig, file_id: &str) -> Result<()> {
    let url = format!("{}/v3/files/{}", cfg.api_url, file_id);
    request_with_retry(client, cfg, Method::DELETE, &url, None, "delete_document").await?;
    info!("Google: document {} deleted", file_id);
    Ok(())
}
