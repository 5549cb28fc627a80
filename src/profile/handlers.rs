use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{ProfileResponse, UpdateOccupationRequest, UpdateUsernameRequest};
use crate::{
    auth::{
        dto::StatusMessage,
        extractors::CurrentUser,
        repo_types::User,
        services::{clean_text, MAX_OCCUPATION_LEN, MAX_USERNAME_LEN},
    },
    error::{is_unique_violation, ApiError},
    extract::ValidJson,
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/update-username", put(update_username))
        .route("/auth/update-occupation", put(update_occupation))
        .route("/profile", get(get_profile))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_username(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<UpdateUsernameRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    let username = clean_text(&payload.username, "Username", MAX_USERNAME_LEN)?;

    if let Some(owner) = User::find_by_username(&state.db, &username).await? {
        if owner.id != user.id {
            return Err(ApiError::bad_request("Username already taken"));
        }
    }

    match User::set_username(&state.db, user.id, &username).await {
        Ok(()) => {}
        Err(e) if is_unique_violation(&e) => {
            warn!("username claimed concurrently");
            return Err(ApiError::bad_request("Username already taken"));
        }
        Err(e) => return Err(e.into()),
    }

    info!("username updated");
    Ok(Json(StatusMessage::success("Username updated successfully")))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_occupation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<UpdateOccupationRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    let occupation = clean_text(&payload.occupation, "Occupation", MAX_OCCUPATION_LEN)?;
    User::set_occupation(&state.db, user.id, &occupation).await?;
    Ok(Json(StatusMessage::success("Occupation updated successfully")))
}

#[instrument(skip_all)]
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        status: "success",
        profile: user.into(),
    })
}
