use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;
use crate::engine::transitions::TransitionError;
use crate::models::order::OrderStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("order is {from} and cannot be moved to {to} from there")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order is already {0}; no further changes are possible")]
    TerminalState(OrderStatus),

    #[error("a photo is required to confirm the pickup")]
    MissingPhoto,

    #[error("scanned code {scanned} does not match the order")]
    QrMismatch { scanned: String },

    #[error("sign in required")]
    Unauthenticated,

    #[error("order {0} is not assigned to this driver for this step")]
    NotAssigned(String),

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::TerminalState(_) => "terminal_state",
            AppError::MissingPhoto => "missing_evidence",
            AppError::QrMismatch { .. } => "qr_mismatch",
            AppError::Unauthenticated => "unauthenticated",
            AppError::NotAssigned(_) => "not_assigned",
            AppError::Backend(_) => "remote_failure",
            AppError::Internal(_) => "internal",
        }
    }

    /// Failures detected before anything was sent to the backend.
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            AppError::InvalidTransition { .. }
                | AppError::TerminalState(_)
                | AppError::MissingPhoto
                | AppError::QrMismatch { .. }
        )
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Terminal { current } => AppError::TerminalState(current),
            TransitionError::NotPermitted { from, to } => AppError::InvalidTransition { from, to },
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound => AppError::NotFound("record not found".to_string()),
            BackendError::InvalidCredentials => AppError::Unauthenticated,
            BackendError::AlreadyExists(what) => AppError::Conflict(format!("{what} already exists")),
            other => AppError::Backend(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_)
            | AppError::InvalidTransition { .. }
            | AppError::TerminalState(_) => StatusCode::CONFLICT,
            AppError::MissingPhoto | AppError::QrMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::NotAssigned(_) => StatusCode::FORBIDDEN,
            AppError::Backend(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        if let AppError::QrMismatch { .. } = &self {
            body["options"] = json!(["rescan", "cancel"]);
        }

        (status, Json(body)).into_response()
    }
}
