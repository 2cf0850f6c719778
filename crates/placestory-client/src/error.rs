use placestory_shared::StoryError;
use thiserror::Error;

/// Errors produced by the remote story API client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport failure (connect, TLS, body stream).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer from the API.
    #[error("Error {status}: {message}")]
    Api { status: u16, message: String },

    /// 2xx answer whose body could not be understood.
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Story creation answered without a server-assigned id.
    #[error("{message}")]
    MissingId { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::MissingId { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Text suitable for an alert, without the status prefix.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } | Self::MissingId { message, .. } => message.clone(),
            Self::InvalidResponse(_) => "Invalid response from server".to_string(),
            other => other.to_string(),
        }
    }

    pub fn into_upload_error(self) -> StoryError {
        StoryError::upload(self.status(), self.user_message())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
