//! Session extractor.
//!
//! The credential is read from `Authorization: Bearer <token>` or, failing
//! that, from the `relay_session` cookie.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use relay_core::UserId;
use std::sync::Arc;

use crate::error::ServerError;
use crate::state::AppState;

const SESSION_COOKIE: &str = "relay_session";

/// The authenticated caller.
pub struct CurrentUser(pub UserId);

fn session_token(parts: &Parts) -> Option<&str> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    if bearer.is_some() {
        return bearer;
    }
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then_some(value)
        })
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or(ServerError::Unauthorized)?;
        state
            .sessions
            .validate(token)
            .await
            .map(CurrentUser)
            .ok_or(ServerError::Unauthorized)
    }
}
