use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicAccount, RefreshRequest, RegisterRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        services::{self, AuthError},
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/me", get(me))
}

#[instrument(skip(state, keys, payload))]
pub async fn register(
    State(state): State<AppState>,
    State(keys): State<JwtKeys>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    Ok(Json(services::register(&state.db, &keys, payload).await?))
}

#[instrument(skip(state, keys, payload))]
pub async fn login(
    State(state): State<AppState>,
    State(keys): State<JwtKeys>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    Ok(Json(services::login(&state.db, &keys, payload).await?))
}

#[instrument(skip(state, keys, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    State(keys): State<JwtKeys>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    Ok(Json(
        services::refresh(&state.db, &keys, &payload.refresh_token).await?,
    ))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(account_id): AuthUser,
) -> Result<Json<PublicAccount>, AuthError> {
    Ok(Json(services::current_account(&state.db, account_id).await?))
}

#[cfg(test)]
mod handler_tests {
    use super::*;
    use crate::app::build_app;
    use axum::{
        body::Body,
        extract::FromRef,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    #[tokio::test]
    async fn me_requires_access_token() {
        let state = AppState::fake();
        let refresh = JwtKeys::from_ref(&state).sign_refresh(Uuid::new_v4()).unwrap();
        for auth in [None, Some("Token abc".to_string()), Some(format!("Bearer {refresh}"))] {
            let mut req = Request::builder().uri("/api/v1/me");
            if let Some(value) = auth {
                req = req.header(header::AUTHORIZATION, value);
            }
            let resp = build_app(state.clone())
                .oneshot(req.body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn refresh_rejects_access_token_before_touching_db() {
        let state = AppState::fake();
        let access = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4()).unwrap();
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/refresh")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "refresh_token": access }).to_string(),
            ))
            .unwrap();
        let resp = build_app(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_validates_before_touching_db() {
        let state = AppState::fake();
        for (body, expected) in [
            (
                serde_json::json!({ "email": "bad", "password": "long-enough" }),
                StatusCode::BAD_REQUEST,
            ),
            (
                serde_json::json!({ "email": "a@b.co", "password": "short" }),
                StatusCode::BAD_REQUEST,
            ),
        ] {
            let req = Request::builder()
                .method("POST")
                .uri("/api/v1/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            let resp = build_app(state.clone()).oneshot(req).await.unwrap();
            assert_eq!(resp.status(), expected);
        }
    }
}
