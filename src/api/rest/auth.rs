use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::state::AppState;

/// The signed-in driver behind a request's bearer token.
pub struct CurrentDriver {
    pub driver: Driver,
    pub token: String,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentDriver {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthenticated)?;
        let driver = state
            .identity
            .resolve(&token)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        Ok(Self { driver, token })
    }
}
