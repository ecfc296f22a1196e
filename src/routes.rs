use std::sync::Arc;

use axum::{
    extract::{Form, Json, Path, State},
    http::{HeaderMap, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
    Router,
};
use reqwest::Client;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::{key_extractor::KeyExtractor, GovernorError, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::auth::{self, TokenKeys};
use crate::database::{self, Database};
use crate::error::ApiError;
use crate::google::GoogleConfig;
use crate::models::{
    AddOrganizerResponse, CreateTournamentResponse, LoginRequest, RegisterRequest, TokenResponse,
    TournamentCreateRequest, TournamentResponse, UserProfile,
};
use crate::tournaments;
use crate::utils::bearer_token;

#[derive(Clone)]
pub struct AppState {
    pub http_client: Client,
    pub database: Database,
    pub keys: TokenKeys,
    pub google: GoogleConfig,
}

// IP-based key extractor for authentication endpoints (before login)
#[derive(Clone)]
pub struct IpKeyExtractor;

impl KeyExtractor for IpKeyExtractor {
    type Key = String;

    fn name(&self) -> &'static str {
        "client_ip"
    }

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();

        // X-Forwarded-For can contain multiple IPs, the first one is the client
        if let Some(forwarded_for) = headers.get("x-forwarded-for") {
            if let Ok(forwarded_str) = forwarded_for.to_str() {
                if let Some(first_ip) = forwarded_str.split(',').next() {
                    let ip = first_ip.trim();
                    if !ip.is_empty() {
                        return Ok(ip.to_string());
                    }
                }
            }
        }

        if let Some(real_ip) = headers.get("x-real-ip") {
            if let Ok(ip_str) = real_ip.to_str() {
                if !ip_str.trim().is_empty() {
                    return Ok(ip_str.trim().to_string());
                }
            }
        }

        // Without a usable header, key on a hash of the user agent so limiting
        // still applies behind misconfigured proxies
        let user_agent = headers
            .get("user-agent")
            .and_then(|ua| ua.to_str().ok())
            .unwrap_or("unknown");

        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        user_agent.hash(&mut hasher);
        let ua_hash = hasher.finish();

        Ok(format!("fallback_{}", ua_hash))
    }
}

/// Builds the full application router. Registration and login sit behind an
/// IP-keyed rate limit; everything else authenticates per request through the
/// bearer token.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ]);

    let auth_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(1)
            .burst_size(3)
            .key_extractor(IpKeyExtractor)
            .finish()
            .unwrap(),
    );

    let auth_routes = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .layer(GovernorLayer {
            config: auth_governor_conf,
        })
        .layer(middleware::from_fn(rewrite_429_to_json));

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes)
        .route("/create_tournament", post(create_tournament))
        .route("/tournament/:id/:name", get(get_tournament))
        .route("/tournament/:id/add/:username", post(add_organizer))
        .route("/users/:username", get(get_user_profile))
        .layer(cors)
        .with_state(state)
}

// Middleware to rewrite 429 responses to JSON
async fn rewrite_429_to_json(req: axum::extract::Request, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        let body = serde_json::json!({
            "detail": "Rate limit exceeded. Please slow down and try again in a few moments."
        });
        return (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    }
    response
}

async fn health_check() -> impl IntoResponse {
    ResponseJson(serde_json::json!({
        "status": "healthy",
        "service": "tft-tournament-backend",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    info!("Registration attempt for username: {}", payload.username);

    match state
        .database
        .create_user(&payload.username, &payload.password, &payload.email)
        .await
    {
        Ok(_) => {}
        Err(e) if database::is_unique_violation(&e) => {
            return Err(ApiError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let token = auth::create_access_token(&state.keys, &payload.username, None)?;
    info!("User {} registered", payload.username);
    Ok(Json(TokenResponse::bearer(token)))
}

async fn login(
    State(state): State<AppState>,
    Form(payload): Form<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    info!("Login attempt for username: {}", payload.username);

    let user = state
        .database
        .get_user_by_username(&payload.username)
        .await?
        .ok_or_else(|| ApiError::NotFound("Username not found. Please register.".to_string()))?;

    let valid = user
        .verify_password(&payload.password)
        .map_err(|_| ApiError::Upstream("Password verification failed".to_string()))?;
    if !valid {
        return Err(ApiError::Unauthorized("Incorrect password".to_string()));
    }

    let token = auth::create_access_token(&state.keys, &user.username, None)?;
    Ok(Json(TokenResponse::bearer(token)))
}

async fn create_tournament(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TournamentCreateRequest>,
) -> Result<Json<CreateTournamentResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let user = auth::resolve_identity(&state.database, &state.keys, token).await?;

    let response = tournaments::create_tournament(
        &state.http_client,
        &state.google,
        &state.database,
        &payload,
        user.id,
        &user.email,
    )
    .await?;

    Ok(Json(response))
}

async fn get_tournament(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, name)): Path<(i64, String)>,
) -> Result<Json<TournamentResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    auth::resolve_identity(&state.database, &state.keys, token).await?;

    let tournament = tournaments::get_tournament(&state.database, id, &name).await?;
    Ok(Json(tournament))
}

async fn add_organizer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, username)): Path<(i64, String)>,
) -> Result<Json<AddOrganizerResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let caller = auth::resolve_identity(&state.database, &state.keys, token).await?;

    tournaments::add_organizer(
        &state.http_client,
        &state.google,
        &state.database,
        id,
        caller.id,
        &username,
    )
    .await?;

    Ok(Json(AddOrganizerResponse {
        message: format!("{} added as organizer", username),
    }))
}

async fn get_user_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    let token = bearer_token(&headers)?;
    auth::resolve_identity(&state.database, &state.keys, token).await?;

    let profile = tournaments::user_profile(&state.database, &username).await?;
    Ok(Json(profile))
}
