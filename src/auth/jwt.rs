use std::sync::Arc;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::Duration;
use tracing::debug;

use super::claims::{Claims, TokenPurpose};
use crate::{clock::Clock, config::JwtConfig};

/// Issues and validates the signed, time-limited tokens used for sessions,
/// email verification and password resets. Nothing is stored server side.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    session_ttl: Duration,
    verification_ttl: Duration,
    reset_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(cfg: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            session_ttl: Duration::minutes(cfg.session_ttl_minutes),
            verification_ttl: Duration::hours(cfg.verification_ttl_hours),
            reset_ttl: Duration::minutes(cfg.reset_ttl_minutes),
            clock,
        }
    }

    pub fn ttl(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::Session => self.session_ttl,
            TokenPurpose::Verification => self.verification_ttl,
            TokenPurpose::Reset => self.reset_ttl,
        }
    }

    pub fn issue(&self, subject: &str, purpose: TokenPurpose) -> anyhow::Result<String> {
        self.issue_with_ttl(subject, purpose, self.ttl(purpose))
    }

    pub fn issue_with_ttl(
        &self,
        subject: &str,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        let now = self.clock.now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            purpose,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(purpose = ?purpose, "jwt signed");
        Ok(token)
    }

    /// Returns the subject when the token verifies, is unexpired and carries
    /// `expected`. Every failure collapses to `None`.
    pub fn validate(&self, token: &str, expected: TokenPurpose) -> Option<String> {
        let claims = match self.decode(token) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "jwt rejected");
                return None;
            }
        };
        if claims.purpose != expected {
            debug!(got = ?claims.purpose, expected = ?expected, "jwt purpose mismatch");
            return None;
        }
        if self.clock.now().unix_timestamp() >= claims.exp {
            debug!(purpose = ?claims.purpose, "jwt expired");
            return None;
        }
        Some(claims.sub)
    }

    fn decode(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        // expiry is checked against the injected clock in `validate`
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss", "aud"]);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
