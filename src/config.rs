use std::env;

/// Configuration structure for environment variables
pub struct Config {
    pub secrets_api_url: String,
    pub secrets_token: String,
    pub app_secret_name: String,
    pub google_secret_name: String,
    pub google_api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Config {
            secrets_api_url: env::var("SECRETS_API_URL")
                .map_err(|_| "SECRETS_API_URL must be set")?,
            secrets_token: env::var("SECRETS_TOKEN")
                .map_err(|_| "SECRETS_TOKEN must be set")?,
            app_secret_name: env::var("APP_SECRET_NAME")
                .unwrap_or_else(|_| "tft-tournament-keys".to_string()),
            google_secret_name: env::var("GOOGLE_SECRET_NAME")
                .unwrap_or_else(|_| "google-sheets-key".to_string()),
            google_api_url: env::var("GOOGLE_API_URL")
                .map_err(|_| "GOOGLE_API_URL must be set")?,
        })
    }
}
