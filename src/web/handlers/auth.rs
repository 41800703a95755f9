//! Authentication handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::AuthGrant;
use crate::db::user::UserProfile;
use crate::web::error::ApiError;
use crate::web::handlers::{require_session, AppState, ClientIp, MaybeBearer};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteConfirmRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// POST /api/auth/register - start registration, send a code.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth
        .register_request(&req.name, &req.email, &req.password, ip.as_deref())
        .await?;
    Ok(Json(MessageResponse {
        message: "verification code sent",
    }))
}

/// POST /api/auth/register/verify - redeem the code, open a session.
pub async fn register_verify(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<AuthGrant>, ApiError> {
    let grant = state
        .auth
        .register_confirm(&req.email, &req.code, ip.as_deref(), None)
        .await?;
    Ok(Json(grant))
}

/// POST /api/auth/login - check credentials, send a code.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth
        .login_request(&req.email, &req.password, ip.as_deref())
        .await?;
    Ok(Json(MessageResponse {
        message: "verification code sent",
    }))
}

/// POST /api/auth/login/verify - redeem the code, open a session.
pub async fn login_verify(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<AuthGrant>, ApiError> {
    let grant = state
        .auth
        .login_confirm(&req.email, &req.code, ip.as_deref(), None)
        .await?;
    Ok(Json(grant))
}

/// POST /api/auth/logout - close the presented session.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    bearer: MaybeBearer,
    ClientIp(ip): ClientIp,
) -> Result<Json<MessageResponse>, ApiError> {
    let session = require_session(&state, &bearer, ip.as_deref()).await?;
    state.auth.logout(&session, ip.as_deref()).await?;
    Ok(Json(MessageResponse {
        message: "logged out",
    }))
}

/// GET /api/auth/me - profile of the authenticated account.
pub async fn me(
    State(state): State<Arc<AppState>>,
    bearer: MaybeBearer,
    ClientIp(ip): ClientIp,
) -> Result<Json<UserProfile>, ApiError> {
    let session = require_session(&state, &bearer, ip.as_deref()).await?;
    let profile = state.auth.profile(session.user_id).await?;
    Ok(Json(profile))
}

/// POST /api/account/delete - re-check the password, send a deletion code.
pub async fn delete_request(
    State(state): State<Arc<AppState>>,
    bearer: MaybeBearer,
    ClientIp(ip): ClientIp,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let session = require_session(&state, &bearer, ip.as_deref()).await?;
    state
        .auth
        .delete_request(&session, &req.password, ip.as_deref())
        .await?;
    Ok(Json(MessageResponse {
        message: "confirmation code sent",
    }))
}

/// POST /api/account/delete/confirm - redeem the code, delete the account.
pub async fn delete_confirm(
    State(state): State<Arc<AppState>>,
    bearer: MaybeBearer,
    ClientIp(ip): ClientIp,
    Json(req): Json<DeleteConfirmRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let session = require_session(&state, &bearer, ip.as_deref()).await?;
    state
        .auth
        .delete_confirm(&session, &req.code, ip.as_deref())
        .await?;
    Ok(Json(MessageResponse {
        message: "account deleted",
    }))
}
