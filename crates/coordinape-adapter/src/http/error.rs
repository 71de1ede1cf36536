/*
[INPUT]:  Error sources (HTTP, backend, wallet provider, storage, serialization)
[OUTPUT]: Structured error taxonomy for the whole adapter
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing propagation policy
*/

use reqwest::StatusCode;
use thiserror::Error;

use crate::types::ConnectorKind;

/// Main error type for the Coordinape adapter
#[derive(Error, Debug)]
pub enum CoordinapeError {
    /// Network-level failure talking to the backend
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status; body is passed through verbatim
    #[error("Backend returned status {status}: {body}")]
    Transport { status: u16, body: String },

    /// Wallet provider did not answer within the activation window
    #[error("Wallet activation timed out after {seconds}s")]
    ConnectionTimeout { seconds: u64 },

    /// Wallet provider reported a failure
    #[error("Wallet connection error: {0}")]
    Connection(String),

    /// A newer activation replaced this one before it completed
    #[error("Wallet activation superseded by a newer attempt")]
    ActivationSuperseded,

    /// Session moved to another address or disconnected while a request was in flight
    #[error("Wallet session changed before the operation completed")]
    SessionChanged,

    /// No connector registered for the requested kind
    #[error("No connector registered for {0:?}")]
    UnknownConnector(ConnectorKind),

    /// User dismissed the signing prompt
    #[error("Signature request rejected by user")]
    UserRejected,

    /// Signing was requested without a live provider
    #[error("No wallet provider connected")]
    NoProvider,

    /// Mutating call attempted without an active address
    #[error("No active wallet address; log in first")]
    Unauthenticated,

    /// Cached token was refused by the backend
    #[error("Cached token for {address} was rejected")]
    StaleToken { address: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Credential store could not be read or written
    #[error("Credential store error: {0}")]
    Storage(#[from] std::io::Error),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoordinapeError {
    /// Check if error indicates the user must (re-)authenticate
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            CoordinapeError::Unauthenticated
                | CoordinapeError::StaleToken { .. }
                | CoordinapeError::UserRejected
                | CoordinapeError::NoProvider
        )
    }

    /// Check if error came from the wallet connection lifecycle
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            CoordinapeError::ConnectionTimeout { .. }
                | CoordinapeError::Connection(_)
                | CoordinapeError::ActivationSuperseded
                | CoordinapeError::UnknownConnector(_)
        )
    }

    /// HTTP status for transport errors, if the backend produced one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CoordinapeError::Transport { status, .. } => StatusCode::from_u16(*status).ok(),
            CoordinapeError::Http(err) => err.status(),
            _ => None,
        }
    }

    /// Backend rejected the credentials (401/403)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN)
        )
    }

    /// Create a transport error from status code and raw body
    pub fn transport(status: StatusCode, body: impl Into<String>) -> Self {
        CoordinapeError::Transport {
            status: status.as_u16(),
            body: body.into(),
        }
    }
}

/// Result type alias for Coordinape operations
pub type Result<T> = std::result::Result<T, CoordinapeError>;
