use thiserror::Error;

use webpush_crypto::CryptoError;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(String),

    #[error("Push service rejected message with status {status}: {body}")]
    PushDeliveryError { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid push options: {0}")]
    InvalidOptions(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Signaling error: {0}")]
    Signaling(String),

    #[error("Overloaded: {0}")]
    Overloaded(String),

    #[error("Timed out waiting for {0} response")]
    SignalingTimeout(String),

    #[error("Unexpected {message_type} status: {status}")]
    UnexpectedStatus { message_type: String, status: u16 },

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PushError {
    /// Whether the operation may succeed if retried.
    ///
    /// Crypto failures are never retryable: the same ciphertext or key
    /// material fails the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            PushError::Transport(_)
            | PushError::PushDeliveryError { .. }
            | PushError::Signaling(_)
            | PushError::Overloaded(_)
            | PushError::SignalingTimeout(_) => true,
            PushError::UnknownSubscription(_)
            | PushError::InvalidEndpoint(_)
            | PushError::InvalidSubscription(_)
            | PushError::Unauthorized(_)
            | PushError::InvalidOptions(_)
            | PushError::InvalidConfig(_)
            | PushError::UnexpectedStatus { .. }
            | PushError::Crypto(_)
            | PushError::Json(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PushError>;
