use axum::http::StatusCode;
use slack_morphism::errors::SlackClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Slack relay is not configured (missing token or channel)")]
    ServiceUnavailable,

    #[error("Failed to normalize request body: {0}")]
    BadRequest(String),

    #[error("Failed to access Slack API: {0}")]
    ApiError(String),

    #[error("Failed to send HTTP request: {0}")]
    HttpError(String),

    #[error("Failed to upload file to Slack: {0}")]
    FileUpload(String),

    #[error("Unhandled failure: {0}")]
    Unhandled(String),
}

impl RelayError {
    /// HTTP status reported to the webhook sender for this failure.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::ApiError(_)
            | RelayError::HttpError(_)
            | RelayError::FileUpload(_)
            | RelayError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            RelayError::ServiceUnavailable => "Service is not available.",
            RelayError::BadRequest(_) => "Invalid POST data.",
            RelayError::ApiError(_) | RelayError::HttpError(_) | RelayError::FileUpload(_) => {
                "Unable to process the message."
            }
            RelayError::Unhandled(_) => "Internal server error.",
        }
    }
}

impl From<SlackClientError> for RelayError {
    fn from(error: SlackClientError) -> Self {
        RelayError::ApiError(error.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(error: reqwest::Error) -> Self {
        RelayError::HttpError(error.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(error: serde_json::Error) -> Self {
        RelayError::BadRequest(error.to_string())
    }
}

impl From<std::io::Error> for RelayError {
    fn from(error: std::io::Error) -> Self {
        RelayError::Unhandled(error.to_string())
    }
}

impl From<anyhow::Error> for RelayError {
    fn from(error: anyhow::Error) -> Self {
        RelayError::Unhandled(error.to_string())
    }
}
