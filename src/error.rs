use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Crate-wide handler error.  Everything here surfaces as a 500 with a terse
/// JSON body; details go to the log, not the wire.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("gemini request failed: {0}")]
    Gemini(#[from] reqwest::Error),
    #[error("report rendering failed: {0}")]
    Report(String),
    #[error("csv serialization failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error=%self, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal server error" })),
        )
            .into_response()
    }
}

/// Outcome of an outbound Twilio send, typed so callers can tell a transport
/// problem from a rejected recipient when deciding what to record.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Network: {0}")]
    Network(String),
    #[error("Auth: {0}")]
    Auth(String),
    #[error("InvalidRecipient: {0}")]
    InvalidRecipient(String),
    #[error("Api: code {code}: {message}")]
    Api { code: i64, message: String },
}

impl SendError {
    /// Short kind tag, recorded alongside the message in `delivery_error_message`.
    pub fn kind(&self) -> &'static str {
        match self {
            SendError::Network(_) => "Network",
            SendError::Auth(_) => "Auth",
            SendError::InvalidRecipient(_) => "InvalidRecipient",
            SendError::Api { .. } => "Api",
        }
    }
}
