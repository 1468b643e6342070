use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::StaffAccount;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Returned by register, login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub account: PublicAccount,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PublicAccount {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl From<StaffAccount> for PublicAccount {
    fn from(a: StaffAccount) -> Self {
        Self {
            id: a.id,
            email: a.email,
            display_name: a.display_name,
        }
    }
}
