//! Session extraction for API and page handlers.
//!
//! Tokens are read from `Authorization: Bearer <token>` first and from the
//! `goldsmith_session` cookie second, so browser pages and API clients share one
//! verifier. A missing or invalid token is a 401; a valid token with the wrong
//! role is a 403.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::Utc;
use goldsmith_core::flows::{Actor, ActorRole};
use goldsmith_core::session::{SessionClaims, SessionSigner};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "goldsmith_session";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Request correlation id, taken from `x-correlation-id` or generated.
#[derive(Clone, Debug)]
pub struct CorrelationId(pub String);

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(correlation_id(&parts.headers)))
    }
}

pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4().simple()))
}

pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
}

/// True when the request carries a valid, unexpired admin session.
pub fn has_admin_session(headers: &HeaderMap, signer: &SessionSigner) -> bool {
    session_token(headers)
        .and_then(|token| signer.verify(token, Utc::now()).ok())
        .is_some_and(|claims| claims.role == ActorRole::Admin)
}

/// A verified session plus the correlation id of the request that carried it.
#[derive(Clone, Debug)]
pub struct Session {
    pub claims: SessionClaims,
    pub correlation_id: String,
}

impl Session {
    pub fn actor(&self) -> Actor {
        self.claims.actor()
    }

    pub fn role(&self) -> ActorRole {
        self.claims.role
    }

    pub fn subject_id(&self) -> &str {
        &self.claims.subject_id
    }

    pub fn require(&self, role: ActorRole) -> Result<(), ApiError> {
        if self.claims.role == role {
            return Ok(());
        }
        Err(ApiError::forbidden(
            format!("{} session required, got {}", role, self.claims.role),
            &self.correlation_id,
        ))
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let correlation_id = correlation_id(&parts.headers);
        let token = session_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("session token is required", &correlation_id))?;
        let claims = state
            .sessions
            .verify(token, Utc::now())
            .map_err(|error| ApiError::from_session(error, &correlation_id))?;
        Ok(Self { claims, correlation_id })
    }
}
