//! Error types for the Fiddle client

use fiddle_client_api::FiddleApiError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when using the Fiddle client
#[derive(Debug, Error)]
pub enum FiddleError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Fiddle not valid! {errors}")]
    Invalid { errors: serde_json::Value },

    #[error("Server returned error status {status}: {body}")]
    ServerError { status: StatusCode, body: String },

    #[error("Execute response did not contain a session ID")]
    MissingSession,

    #[error("SSE stream error: {0}")]
    Sse(String),

    #[error("SSE stream closed before a result arrived")]
    StreamClosed,
}

/// Result type alias for Fiddle client operations
pub type FiddleResult<T> = Result<T, FiddleError>;

impl From<FiddleError> for FiddleApiError {
    fn from(error: FiddleError) -> Self {
        match error {
            FiddleError::Invalid { errors } => FiddleApiError::Invalid(errors),
            e @ (FiddleError::Json(_) | FiddleError::MissingSession) => {
                FiddleApiError::Unexpected(e.to_string())
            }
            other => FiddleApiError::Server(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_keeps_server_errors() {
        let errors = json!({"origins": ["bad"]});
        let api: FiddleApiError = FiddleError::Invalid {
            errors: errors.clone(),
        }
        .into();

        match api {
            FiddleApiError::Invalid(value) => assert_eq!(value, errors),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_undecodable_payloads_are_unexpected() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();

        assert!(matches!(
            FiddleApiError::from(FiddleError::Json(json_error)),
            FiddleApiError::Unexpected(_)
        ));
        assert!(matches!(
            FiddleApiError::from(FiddleError::MissingSession),
            FiddleApiError::Unexpected(_)
        ));
    }

    #[test]
    fn test_transport_and_status_failures_are_server_errors() {
        let api: FiddleApiError = FiddleError::ServerError {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream down".into(),
        }
        .into();
        match api {
            FiddleApiError::Server(message) => {
                assert!(message.contains("502"));
                assert!(message.contains("upstream down"));
            }
            other => panic!("expected Server, got {other:?}"),
        }

        assert!(matches!(
            FiddleApiError::from(FiddleError::StreamClosed),
            FiddleApiError::Server(_)
        ));
        assert!(matches!(
            FiddleApiError::from(FiddleError::Sse("Eof".into())),
            FiddleApiError::Server(_)
        ));
    }
}
