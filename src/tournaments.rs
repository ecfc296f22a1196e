use reqwest::Client;
use tracing::{error, info, warn};

use crate::database::{self, Database, TournamentRow};
use crate::error::ApiError;
use crate::google::{self, GoogleConfig};
use crate::models::{CreateTournamentResponse, TournamentCreateRequest, TournamentResponse, UserProfile};
use crate::utils::file_id_from_link;

fn sheets_link(sheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{}/edit", sheet_id)
}

fn form_link(form_id: &str) -> String {
    format!("https://docs.google.com/forms/d/{}/edit", form_id)
}

/// Creates the spreadsheet, the sign-up form and the stored tournament in that
/// order. If a later step fails, the documents created so far are deleted in
/// reverse order before the original error is surfaced. Compensation failures
/// are logged and swallowed so they cannot mask the root cause.
pub async fn create_tournament(
    client: &Client,
    google: &GoogleConfig,
    db: &Database,
    req: &TournamentCreateRequest,
    creator_id: i64,
    creator_email: &str,
) -> Result<CreateTournamentResponse, ApiError> {
    let sheet_id = google::create_sheet(
        client,
        google,
        &format!("Tournament: {}", req.name),
        creator_email,
    )
    .await
    .map_err(|e| ApiError::Upstream(format!("Failed to create spreadsheet: {}", e)))?;

    let form_id = match google::create_form(
        client,
        google,
        &format!("Tournament Sign-Up: {}", req.name),
        creator_email,
    )
    .await
    {
        Ok(id) => id,
        Err(e) => {
            compensate(client, google, &[&sheet_id]).await;
            return Err(ApiError::Upstream(format!("Failed to create form: {}", e)));
        }
    };

    let stored = db
        .create_tournament(
            &req.name,
            &sheets_link(&sheet_id),
            &form_link(&form_id),
            req.sign_up_deadline,
            req.start_date,
            req.end_date,
            creator_id,
        )
        .await;

    if let Err(e) = stored {
        error!("storing tournament '{}' failed: {}", req.name, e);
        compensate(client, google, &[&form_id, &sheet_id]).await;
        return Err(ApiError::Upstream("Failed to store tournament".to_string()));
    }

    info!("Tournament '{}' created by user {}", req.name, creator_id);
    Ok(CreateTournamentResponse { sheet_id, form_id })
}

async fn compensate(client: &Client, google: &GoogleConfig, file_ids: &[&str]) {
    for file_id in file_ids {
        if let Err(e) = google::delete_document(client, google, file_id).await {
            warn!("compensation delete of {} failed: {}", file_id, e);
        }
    }
}

/// Grants an existing user organizer rights: a membership row plus editor
/// access to both documents. The row is inserted first but committed last, so
/// a failed grant leaves no half-organizer behind.
pub async fn add_organizer(
    client: &Client,
    google: &GoogleConfig,
    db: &Database,
    tournament_id: i64,
    caller_id: i64,
    target_username: &str,
) -> Result<(), ApiError> {
    let tournament = db
        .get_tournament(tournament_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tournament not found".to_string()))?;

    if !db.is_organizer(caller_id, tournament_id).await? {
        return Err(ApiError::Forbidden(
            "Not authorized to modify this tournament".to_string(),
        ));
    }

    let target = db
        .get_user_by_username(target_username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let mut tx = db.begin().await?;
    if let Err(e) = database::insert_organizer(&mut tx, target.id, tournament_id).await {
        if database::is_unique_violation(&e) {
            return Err(ApiError::Conflict(
                "User is already an organizer".to_string(),
            ));
        }
        return Err(e.into());
    }

    grant_document_access(client, google, &tournament, &target.email).await?;

    tx.commit().await?;
    info!(
        "User {} added as organizer of tournament {}",
        target_username, tournament_id
    );
    Ok(())
}

async fn grant_document_access(
    client: &Client,
    google: &GoogleConfig,
    tournament: &TournamentRow,
    email: &str,
) -> Result<(), ApiError> {
    let sheet_id = file_id_from_link(&tournament.sheets_link).ok_or_else(|| {
        error!("tournament {} has an unparseable sheets link", tournament.id);
        ApiError::Upstream("Failed to grant document access".to_string())
    })?;
    let form_id = file_id_from_link(&tournament.form_link).ok_or_else(|| {
        error!("tournament {} has an unparseable form link", tournament.id);
        ApiError::Upstream("Failed to grant document access".to_string())
    })?;

    google::set_sheet_permissions(client, google, sheet_id, email)
        .await
        .map_err(|e| ApiError::Upstream(format!("Failed to grant spreadsheet access: {}", e)))?;
    google::set_form_permissions(client, google, form_id, email)
        .await
        .map_err(|e| ApiError::Upstream(format!("Failed to grant form access: {}", e)))
}

/// Looks up a tournament by id and display name. The name acts as a check
/// against stale links, so a mismatch reads the same as a missing tournament.
pub async fn get_tournament(
    db: &Database,
    tournament_id: i64,
    name: &str,
) -> Result<TournamentResponse, ApiError> {
    let tournament = db
        .get_tournament(tournament_id)
        .await?
        .filter(|t| t.name == name)
        .ok_or_else(|| ApiError::NotFound("Tournament not found".to_string()))?;

    let organizers = db.organizer_usernames(tournament_id).await?;
    Ok(to_response(tournament, organizers))
}

pub async fn user_profile(db: &Database, username: &str) -> Result<UserProfile, ApiError> {
    let user = db
        .get_user_by_username(username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let mut tournaments = Vec::new();
    for row in db.tournaments_for_user(user.id).await? {
        let organizers = db.organizer_usernames(row.id).await?;
        tournaments.push(to_response(row, organizers));
    }

    Ok(UserProfile {
        username: user.username,
        email: user.email,
        tournaments,
    })
}

fn to_response(row: TournamentRow, organizers: Vec<String>) -> TournamentResponse {
    TournamentResponse {
        id: row.id,
        name: row.name,
        sheets_link: row.sheets_link,
        form_link: row.form_link,
        sign_up_deadline: row.sign_up_deadline,
        start_date: row.start_date,
        end_date: row.end_date,
        organizers,
    }
}
