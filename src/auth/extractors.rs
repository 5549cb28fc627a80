use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use tracing::warn;

use super::{claims::TokenPurpose, repo_types::User};
use crate::{error::ApiError, state::AppState};

/// Name of the HTTP-only cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth_token";

/// The authenticated caller. Taking this extractor guards a handler:
/// a missing cookie, a token that fails validation, or a subject with no
/// user row rejects the request with 401 before the handler body runs.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(AUTH_COOKIE)
            .map(|c| c.value())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Token is missing"))?;

        let email = state
            .tokens
            .validate(token, TokenPurpose::Session)
            .ok_or_else(|| {
                warn!("invalid or expired session token");
                ApiError::unauthorized("Invalid token")
            })?;

        let user = User::find_by_email(&state.db, &email)
            .await?
            .ok_or_else(|| {
                warn!(email = %email, "session subject has no user");
                ApiError::unauthorized("User not found")
            })?;

        Ok(CurrentUser(user))
    }
}
