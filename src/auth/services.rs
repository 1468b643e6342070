use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    dto::{AuthResponse, LoginRequest, PublicAccount, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo_types::StaffAccount,
};

pub const MIN_PASSWORD_LEN: usize = 8;
const MAX_DISPLAY_NAME_LEN: usize = 100;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Password must be at least 8 characters")]
    WeakPassword,
    #[error("Display name is too long")]
    DisplayNameTooLong,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired refresh token")]
    BadRefreshToken,
    #[error("Account not found")]
    UnknownAccount,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail | Self::WeakPassword | Self::DisplayNameTooLong => {
                StatusCode::BAD_REQUEST
            }
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::BadRefreshToken | Self::UnknownAccount => {
                StatusCode::UNAUTHORIZED
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(e) => {
                error!(error = ?e, "auth internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}

fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email)
}

fn normalize_display_name(raw: Option<&str>) -> Result<Option<String>, AuthError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) if name.chars().count() > MAX_DISPLAY_NAME_LEN => {
            Err(AuthError::DisplayNameTooLong)
        }
        other => Ok(other.map(str::to_string)),
    }
}

fn issue(keys: &JwtKeys, account: StaffAccount) -> Result<AuthResponse, AuthError> {
    Ok(AuthResponse {
        access_token: keys.sign_access(account.id)?,
        refresh_token: keys.sign_refresh(account.id)?,
        account: account.into(),
    })
}

#[instrument(skip(db, keys, req))]
pub async fn register(
    db: &PgPool,
    keys: &JwtKeys,
    req: RegisterRequest,
) -> Result<AuthResponse, AuthError> {
    let email = normalize_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    let display_name = normalize_display_name(req.display_name.as_deref())?;

    let hash = hash_password(&req.password)?;
    let account = StaffAccount::create(db, &email, display_name.as_deref(), &hash)
        .await?
        .ok_or_else(|| {
            warn!(%email, "email already registered");
            AuthError::EmailTaken
        })?;
    info!(account_id = %account.id, "staff account registered");
    issue(keys, account)
}

#[instrument(skip(db, keys, req))]
pub async fn login(
    db: &PgPool,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<AuthResponse, AuthError> {
    let email = normalize_email(&req.email).map_err(|_| AuthError::InvalidCredentials)?;
    let Some(account) = StaffAccount::find_by_email(db, &email).await? else {
        warn!(%email, "login for unknown email");
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(&req.password, &account.password_hash)? {
        warn!(account_id = %account.id, "login with wrong password");
        return Err(AuthError::InvalidCredentials);
    }
    info!(account_id = %account.id, "staff logged in");
    issue(keys, account)
}

/// Trades a refresh token for a new pair. The account must still exist.
#[instrument(skip_all)]
pub async fn refresh(db: &PgPool, keys: &JwtKeys, token: &str) -> Result<AuthResponse, AuthError> {
    let claims = keys.verify_refresh(token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AuthError::BadRefreshToken
    })?;
    let account = StaffAccount::find_by_id(db, claims.sub)
        .await?
        .ok_or(AuthError::UnknownAccount)?;
    issue(keys, account)
}

pub async fn current_account(db: &PgPool, id: Uuid) -> Result<PublicAccount, AuthError> {
    StaffAccount::find_by_id(db, id)
        .await?
        .map(PublicAccount::from)
        .ok_or(AuthError::UnknownAccount)
}
