use std::time::Duration;

use reqwest::Client;
use tokio::net::TcpListener;
use tracing::info;

use tft_tournament_backend::auth::TokenKeys;
use tft_tournament_backend::config::Config;
use tft_tournament_backend::database::Database;
use tft_tournament_backend::google::GoogleConfig;
use tft_tournament_backend::routes::{app, AppState};
use tft_tournament_backend::secrets::{fetch_secret, required_key};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let http_client = Client::builder().timeout(Duration::from_secs(10)).build()?;

    // Secrets are read once at startup; the process holds them in memory only
    let app_secret = fetch_secret(
        &http_client,
        &config.secrets_api_url,
        &config.secrets_token,
        &config.app_secret_name,
    )
    .await?;
    let secret_key = required_key(&app_secret, "secret_key", &config.app_secret_name)?;
    let database_url = required_key(&app_secret, "database_url", &config.app_secret_name)?;

    let google_secret = fetch_secret(
        &http_client,
        &config.secrets_api_url,
        &config.secrets_token,
        &config.google_secret_name,
    )
    .await?;
    let google_token = required_key(&google_secret, "token", &config.google_secret_name)?;

    let database = Database::new(&database_url).await?;

    let state = AppState {
        http_client,
        database,
        keys: TokenKeys::new(secret_key.as_bytes()),
        google: GoogleConfig {
            api_url: config.google_api_url,
            token: google_token,
        },
    };

    let listener = TcpListener::bind("0.0.0.0:8080").await?;
    info!("Server starting on port 8080");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
