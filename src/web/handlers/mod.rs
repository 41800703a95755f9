//! HTTP handlers and shared application state.

pub mod auth;
pub mod file;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

use crate::auth::{AuthService, Session};
use crate::file::FileService;
use crate::web::error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub files: FileService,
}

impl AppState {
    pub fn new(auth: AuthService, files: FileService) -> Self {
        Self { auth, files }
    }
}

/// Client IP, taken from the socket when the server exposes it.
///
/// Extraction never fails; handlers thread the value into audit rows
/// and code issuance as-is.
pub struct ClientIp(pub Option<String>);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(ClientIp(ip))
    }
}

/// Bearer token from the Authorization header, if present.
pub struct MaybeBearer(pub Option<String>);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for MaybeBearer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await;
        Ok(MaybeBearer(
            header.ok().map(|TypedHeader(auth)| auth.token().to_string()),
        ))
    }
}

/// Resolve the bearer token into a live session or reject with 401.
pub async fn require_session(
    state: &Arc<AppState>,
    bearer: &MaybeBearer,
    ip: Option<&str>,
) -> Result<Session, ApiError> {
    let token = bearer
        .0
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    let session = state.auth.authenticate(token, ip).await?;
    Ok(session)
}
