use serde::{Deserialize, Serialize};

/// What a token may be used for. A token is only accepted where its purpose is expected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Session,
    Verification,
    Reset,
}

/// JWT payload shared by all three token purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,    // user email
    pub iat: i64,       // issued at (unix timestamp)
    pub exp: i64,       // expires at (unix timestamp)
    pub iss: String,    // issuer
    pub aud: String,    // audience
    pub purpose: TokenPurpose,
}
