use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        claims::TokenPurpose,
        dto::{
            EmailRequest, LoginRequest, LoginResponse, ProfileSummary, ResetPasswordRequest,
            SignupRequest, StatusMessage, VerificationStatusResponse,
        },
        extractors::{CurrentUser, AUTH_COOKIE},
        password::{hash_password, policy_violation, verify_password},
        repo_types::User,
        services::{self, normalize_email},
    },
    error::ApiError,
    extract::ValidJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/verify/:token", get(verify_email))
        .route("/auth/resend-verification", post(resend_verification))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:token", post(reset_password))
        .route("/auth/verification-status", get(verification_status))
}

fn session_cookie(state: &AppState, value: String, max_age: Duration) -> Cookie<'static> {
    let secure = state.config.cookie_secure;
    Cookie::build((AUTH_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        // cross-site frontends need None, which browsers only accept on Secure cookies
        .same_site(if secure { SameSite::None } else { SameSite::Lax })
        .max_age(max_age)
        .build()
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SignupRequest>,
) -> Result<(StatusCode, Json<StatusMessage>), ApiError> {
    services::signup(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(StatusMessage::success(
            "Please check your email for verification.",
        )),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Missing email or password"));
    }

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::unauthorized("Invalid email or password"));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if !user.is_verified {
        warn!(user_id = user.id, "login before email verification");
        return Err(ApiError::unauthorized("Please verify your email first"));
    }

    let token = state.tokens.issue(&user.email, TokenPurpose::Session)?;
    let cookie = session_cookie(&state, token, state.tokens.ttl(TokenPurpose::Session));

    info!(user_id = user.id, "user logged in");
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            status: "success",
            message: "Logged in successfully".into(),
            is_verified: user.is_verified,
            profile: ProfileSummary::from(&user),
        }),
    ))
}

#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<StatusMessage>) {
    let mut expired = session_cookie(&state, String::new(), Duration::ZERO);
    expired.set_expires(OffsetDateTime::UNIX_EPOCH);
    (
        jar.add(expired),
        Json(StatusMessage::success("Logged out successfully")),
    )
}

#[instrument(skip(state, token))]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    let email = state
        .tokens
        .validate(&token, TokenPurpose::Verification)
        .ok_or_else(|| ApiError::bad_request("Invalid or expired verification token"))?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.is_verified || !User::mark_verified(&state.db, user.id).await? {
        return Ok(Json(StatusMessage::success("Email already verified")));
    }

    info!(user_id = user.id, "email verified");
    Ok(Json(StatusMessage::success(
        "Email verified successfully. You can now login.",
    )))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<EmailRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    let email = normalize_email(&payload.email)?;
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.is_verified {
        return Ok(Json(StatusMessage::success("Email already verified")));
    }

    let token = state.tokens.issue(&user.email, TokenPurpose::Verification)?;
    state.notifier.send_verification(&user.email, &token).await?;
    Ok(Json(StatusMessage::success(
        "Verification email sent successfully",
    )))
}

/// Always answers the same way, so the response never reveals whether an
/// account exists.
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<EmailRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    let generic = StatusMessage::success(
        "If an account exists with this email, you will receive a password reset link.",
    );
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::bad_request("Email is required"));
    }

    let user = match User::find_by_email(&state.db, &email).await {
        Ok(Some(u)) => u,
        Ok(None) => return Ok(Json(generic)),
        Err(e) => {
            error!(error = %e, "forgot-password lookup failed");
            return Ok(Json(generic));
        }
    };

    match state.tokens.issue(&user.email, TokenPurpose::Reset) {
        Ok(token) => {
            if let Err(e) = state.notifier.send_password_reset(&user.email, &token).await {
                error!(error = %e, user_id = user.id, "password reset email failed");
            }
        }
        Err(e) => error!(error = %e, user_id = user.id, "reset token signing failed"),
    }
    Ok(Json(generic))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidJson(payload): ValidJson<ResetPasswordRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    if let Some(reason) = policy_violation(&payload.password) {
        return Err(ApiError::bad_request(reason));
    }

    let email = state
        .tokens
        .validate(&token, TokenPurpose::Reset)
        .ok_or_else(|| ApiError::bad_request("Invalid or expired reset token"))?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let hash = hash_password(&payload.password)?;
    User::set_password_hash(&state.db, user.id, &hash).await?;

    info!(user_id = user.id, "password reset");
    Ok(Json(StatusMessage::success(
        "Password has been reset successfully",
    )))
}

#[instrument(skip_all)]
pub async fn verification_status(CurrentUser(user): CurrentUser) -> Json<VerificationStatusResponse> {
    Json(VerificationStatusResponse {
        status: "success",
        is_verified: user.is_verified,
        profile: ProfileSummary::from(&user),
        email: user.email,
    })
}
