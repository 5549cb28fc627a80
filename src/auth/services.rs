use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::{
    auth::{
        claims::TokenPurpose,
        dto::SignupRequest,
        password::{hash_password, policy_violation},
        repo_types::User,
    },
    error::{is_unique_violation, ApiError},
    state::AppState,
};

pub const MAX_USERNAME_LEN: usize = 50;
pub const MAX_OCCUPATION_LEN: usize = 100;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims and lower-cases an email, rejecting anything that does not look like one.
pub(crate) fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::bad_request("Email is required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    Ok(email)
}

/// Trimmed, non-empty, at most `max` characters. `field` names the value in messages.
pub(crate) fn clean_text(raw: &str, field: &str, max: usize) -> Result<String, ApiError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value.to_string())
}

fn optional_text(raw: Option<&str>, field: &str, max: usize) -> Result<Option<String>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => clean_text(v, field, max).map(Some),
    }
}

/// Inserts an unverified account. A UNIQUE violation, i.e. a concurrent
/// signup that won after our pre-checks, becomes a 400.
pub(crate) async fn create_account(
    db: &SqlitePool,
    email: &str,
    username: Option<&str>,
    occupation: Option<&str>,
    password_hash: &str,
) -> Result<User, ApiError> {
    let mut tx = db.begin().await?;
    let user = match User::create_tx(&mut tx, email, username, occupation, password_hash).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %email, "unique constraint hit on signup");
            return Err(ApiError::bad_request("Email or username already registered"));
        }
        Err(e) => return Err(e.into()),
    };
    tx.commit().await?;
    Ok(user)
}

/// Creates an unverified account and sends its verification email. The row
/// is committed before the send so no write lock is held across the network
/// call; a failed send deletes it again.
pub async fn signup(state: &AppState, payload: SignupRequest) -> Result<User, ApiError> {
    let email = normalize_email(&payload.email)?;
    if let Some(reason) = policy_violation(&payload.password) {
        return Err(ApiError::bad_request(reason));
    }
    let username = optional_text(payload.username.as_deref(), "Username", MAX_USERNAME_LEN)?;
    let occupation =
        optional_text(payload.occupation.as_deref(), "Occupation", MAX_OCCUPATION_LEN)?;

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::bad_request("Email already registered"));
    }
    if let Some(name) = username.as_deref() {
        if User::find_by_username(&state.db, name).await?.is_some() {
            warn!(username = %name, "username already taken");
            return Err(ApiError::bad_request("Username already taken"));
        }
    }

    let hash = hash_password(&payload.password)?;
    let token = state.tokens.issue(&email, TokenPurpose::Verification)?;

    let user = create_account(
        &state.db,
        &email,
        username.as_deref(),
        occupation.as_deref(),
        &hash,
    )
    .await?;

    if let Err(e) = state.notifier.send_verification(&email, &token).await {
        error!(error = %e, user_id = user.id, "verification email failed; removing account");
        if let Err(del) = User::delete(&state.db, user.id).await {
            error!(error = ?del, user_id = user.id, "could not remove unverified account");
        }
        return Err(anyhow::anyhow!("Failed to send verification email").into());
    }

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        notifications::Notifier,
        test_support::{GatedMailer, TestApp, PASSWORD},
    };

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.d"));
        assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
        assert!(normalize_email("   ").is_err());
    }

    #[test]
    fn clean_text_trims_and_bounds() {
        assert_eq!(clean_text("  bob ", "Username", 50).unwrap(), "bob");
        assert!(clean_text("   ", "Username", 50).is_err());
        assert!(clean_text(&"x".repeat(51), "Username", 50).is_err());
        assert_eq!(optional_text(Some("  "), "Occupation", 100).unwrap(), None);
        assert_eq!(optional_text(None, "Occupation", 100).unwrap(), None);
    }

    #[tokio::test]
    async fn losing_a_signup_race_is_a_bad_request() {
        let app = TestApp::new().await;
        app.create_user("race@example.com", Some("racer"), false).await;

        // the pre-checks already passed for the loser; only the insert is left
        for (email, username) in [("race@example.com", None), ("other@example.com", Some("racer"))] {
            let err = create_account(&app.state.db, email, username, None, "hash")
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ApiError::BadRequest(ref m) if m == "Email or username already registered"
            ));
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&app.state.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn slow_mail_provider_does_not_block_other_writes() {
        let app = TestApp::new().await;
        let other = app.create_user("other@example.com", None, true).await;
        let gate = Arc::new(GatedMailer::default());
        let state = AppState {
            notifier: Notifier::new(gate.clone(), "http://frontend.test", 60),
            ..app.state.clone()
        };

        let signup_task = tokio::spawn(async move {
            let payload = SignupRequest {
                email: "slow@example.com".into(),
                password: PASSWORD.into(),
                username: None,
                occupation: None,
            };
            signup(&state, payload).await
        });
        gate.entered.notified().await;

        // the email is in flight; an unrelated write must still get through
        let write = User::set_occupation(&app.state.db, other.id, "nurse");
        tokio::time::timeout(Duration::from_secs(2), write)
            .await
            .expect("write blocked behind the mail provider")
            .unwrap();

        gate.release.notify_one();
        let user = signup_task.await.unwrap().unwrap();
        assert_eq!(user.email, "slow@example.com");
        assert!(!user.is_verified);
    }
}
