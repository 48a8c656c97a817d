use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// A submission precondition that did not hold.
///
/// These are checked locally before any call to the backend is made.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The anchor (server) address has not been resolved yet.
    #[error("The tunnel server address has not been resolved yet")]
    AnchorUnresolved,

    /// There is no active session.
    #[error("You must be signed in to create a tunnel")]
    SessionAbsent,

    /// The client address field is empty.
    #[error("Client IPv4 address is required")]
    ClientAddressMissing,

    /// The user already holds the maximum number of tunnels.
    #[error("You already have the maximum number of tunnels")]
    QuotaReached,

    /// The flow is submitting or has already succeeded.
    #[error("A submission is already in progress or completed")]
    NotReady,
}

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// An outbound HTTP error.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The authentication artifact could not be exchanged for a session.
    #[error("Authentication exchange failed: {0}")]
    AuthExchange(String),

    /// A backend listing or lookup failed.
    #[error("Failed to fetch resource: {0}")]
    ResourceFetch(String),

    /// A submission precondition did not hold.
    #[error("{0}")]
    Precondition(#[from] Precondition),

    /// The backend declined to create a tunnel.
    #[error("{0}")]
    CreationRejected(String),

    /// An authentication error (CSRF failures).
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation was abandoned before its result arrived.
    #[error("Operation cancelled")]
    Cancelled,

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The message shown to the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Http(_) => "Upstream service unavailable".to_string(),
            AppError::AuthExchange(_) => "Sign-in failed".to_string(),
            AppError::ResourceFetch(msg)
            | AppError::CreationRejected(msg)
            | AppError::Authentication(msg)
            | AppError::Validation(msg) => msg.clone(),
            AppError::Precondition(p) => p.to_string(),
            AppError::NotFound => "Resource not found".to_string(),
            AppError::Cancelled => "Request cancelled".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl AppError {
    /// The HTTP status this error is rendered with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Http(_) | AppError::ResourceFetch(_) => StatusCode::BAD_GATEWAY,
            AppError::AuthExchange(_) | AppError::Precondition(Precondition::SessionAbsent) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Precondition(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::CreationRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Authentication(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Http(e) => tracing::error!("Upstream HTTP error: {}", e),
            AppError::AuthExchange(msg) => tracing::warn!("Authentication exchange failed: {}", msg),
            AppError::ResourceFetch(msg) => tracing::warn!("Resource fetch failed: {}", msg),
            AppError::Precondition(p) => tracing::debug!("Precondition failed: {}", p),
            AppError::CreationRejected(msg) => tracing::warn!("Tunnel creation rejected: {}", msg),
            AppError::Authentication(msg) => tracing::warn!("Authentication failed: {}", msg),
            AppError::NotFound => tracing::debug!("Resource not found"),
            AppError::Validation(msg) => tracing::debug!("Validation error: {}", msg),
            AppError::Cancelled => tracing::debug!("Operation cancelled"),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
        }

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": self.user_message()
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (
            self.status_code(),
            [(http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
