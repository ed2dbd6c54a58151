use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use tracing::info;

use crate::api::rest::auth::CurrentDriver;
use crate::error::AppError;
use crate::models::driver::{Driver, Session};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver))
        .route("/session", post(sign_in).delete(sign_out))
        .route("/me", get(me))
}

#[derive(Deserialize)]
pub struct RegisterDriverRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if !payload.email.contains('@') {
        return Err(AppError::BadRequest("email is not valid".to_string()));
    }
    if payload.password.is_empty() {
        return Err(AppError::BadRequest("password cannot be empty".to_string()));
    }

    let driver = state
        .identity
        .register_driver(&payload.name, &payload.email, &payload.password)
        .await?;

    info!(driver_id = %driver.id, "driver registered");
    Ok(Json(driver))
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<Session>, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest("email and password are required".to_string()));
    }

    let session = state.identity.sign_in(&payload.email, &payload.password).await?;
    refresh_session_gauge(&state).await?;

    info!(driver_id = %session.driver.id, "driver signed in");
    Ok(Json(session))
}

async fn sign_out(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
) -> Result<StatusCode, AppError> {
    state.identity.sign_out(&current.token).await?;
    refresh_session_gauge(&state).await?;

    info!(driver_id = %current.driver.id, "driver signed out");
    Ok(StatusCode::NO_CONTENT)
}

async fn refresh_session_gauge(state: &AppState) -> Result<(), AppError> {
    let sessions = state.identity.session_count().await?;
    state.metrics.active_sessions.set(sessions as i64);
    Ok(())
}

async fn me(current: CurrentDriver) -> Json<Driver> {
    Json(current.driver)
}
