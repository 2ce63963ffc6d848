use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error as ThisError;

const NETWORK_MESSAGE: &str = "Network error. Please check your connection.";
const SERVER_MESSAGE: &str = "Server error. Please try again later.";

#[derive(Debug, ThisError)]
pub enum ClientError {
    /// Rejected input (4xx other than 401/404).
    #[error("{message}")]
    Validation { status: StatusCode, message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Server { status: StatusCode, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("could not encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Classify a non-2xx response.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let extracted = extract_message(body);
        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized {
                message: extracted.unwrap_or_else(|| "Authentication required".to_string()),
            },
            StatusCode::NOT_FOUND => ClientError::NotFound {
                message: extracted.unwrap_or_else(|| "Resource not found".to_string()),
            },
            s if s.is_server_error() => ClientError::Server {
                status: s,
                message: extracted.unwrap_or_else(|| SERVER_MESSAGE.to_string()),
            },
            s => ClientError::Validation {
                status: s,
                message: extracted
                    .unwrap_or_else(|| format!("Request failed with status {}", s.as_u16())),
            },
        }
    }

    pub async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let body = resp.bytes().await.unwrap_or_default();
        Self::from_status(status, &body)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Validation { status, .. } | ClientError::Server { status, .. } => {
                Some(*status)
            }
            ClientError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            ClientError::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized { .. })
    }

    /// Text suitable for showing to a person.
    pub fn display_message(&self) -> String {
        match self {
            ClientError::Validation { message, .. }
            | ClientError::Unauthorized { message }
            | ClientError::NotFound { message }
            | ClientError::Server { message, .. } => message.clone(),
            ClientError::Network(_) => NETWORK_MESSAGE.to_string(),
            ClientError::Decode(_) | ClientError::Encode(_) | ClientError::Url(_) => {
                "Unexpected error. Please try again.".to_string()
            }
        }
    }
}

/// Pull a readable message out of an error body: `error.message`, then
/// `detail` (string, or the first item's `msg`), then `message`.
fn extract_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let text = |v: &Value| v.as_str().map(str::to_string).filter(|s| !s.is_empty());
    value
        .pointer("/error/message")
        .and_then(text)
        .or_else(|| match value.get("detail")? {
            Value::Array(items) => items.first()?.get("msg").and_then(text),
            other => text(other),
        })
        .or_else(|| value.get("message").and_then(text))
}
