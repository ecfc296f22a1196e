use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// Request/Response models
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Login is submitted as a form, matching the OAuth2 password flow shape.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TournamentCreateRequest {
    pub name: String,
    pub sign_up_deadline: DateTime<Utc>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct CreateTournamentResponse {
    pub sheet_id: String,
    pub form_id: String,
}

#[derive(Debug, Serialize)]
pub struct TournamentResponse {
    pub id: i64,
    pub name: String,
    pub sheets_link: String,
    pub form_link: String,
    pub sign_up_deadline: DateTime<Utc>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub organizers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddOrganizerResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub tournaments: Vec<TournamentResponse>,
}
