use serde::{Deserialize, Serialize};

use crate::auth::repo_types::User;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUsernameRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOccupationRequest {
    #[serde(default)]
    pub occupation: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileDetails {
    pub email: String,
    pub username: Option<String>,
    pub occupation: Option<String>,
    pub is_verified: bool,
}

impl From<User> for ProfileDetails {
    fn from(u: User) -> Self {
        Self {
            email: u.email,
            username: u.username,
            occupation: u.occupation,
            is_verified: u.is_verified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub status: &'static str,
    pub profile: ProfileDetails,
}
