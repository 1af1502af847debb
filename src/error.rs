/// Unified error types for Identity Lens
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{chain::ChainError, identity::data::DecodeError};

/// Main error type for identity operations
///
/// Cloneable so a single failure can be handed to every waiter of a
/// de-duplicated query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdentityError {
    /// Malformed address or search query, rejected before any network call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Chain name not present in the registry
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    /// Transport or decoding failure while resolving a single identity
    #[error("Identity resolution error: {0}")]
    Resolution(String),

    /// Transport failure while searching identities
    #[error("Identity search error: {0}")]
    Search(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Whether the query cache should retry this failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, IdentityError::Resolution(_) | IdentityError::Search(_))
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            IdentityError::InvalidInput(_) => "InvalidInput",
            IdentityError::UnknownChain(_) => "UnknownChain",
            IdentityError::Resolution(_) => "ResolutionError",
            IdentityError::Search(_) => "SearchError",
            IdentityError::Config(_) => "ConfigError",
            IdentityError::Internal(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IdentityError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            IdentityError::UnknownChain(_) => StatusCode::NOT_FOUND,
            IdentityError::Resolution(_) | IdentityError::Search(_) => StatusCode::BAD_GATEWAY,
            IdentityError::Config(_) | IdentityError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub(crate) fn resolution(err: ChainError) -> Self {
        IdentityError::Resolution(err.to_string())
    }

    pub(crate) fn search(err: ChainError) -> Self {
        IdentityError::Search(err.to_string())
    }
}

/// Single-address decoding failures surface as resolution errors
impl From<DecodeError> for IdentityError {
    fn from(err: DecodeError) -> Self {
        IdentityError::Resolution(format!("Malformed identity payload: {}", err))
    }
}

/// Error body carried inside the `error` arm of a query envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&IdentityError> for ErrorBody {
    fn from(err: &IdentityError) -> Self {
        let message = match err {
            // Don't leak details
            IdentityError::Internal(_) => "Internal server error".to_string(),
            _ => err.to_string(),
        };

        Self {
            kind: err.kind().to_string(),
            message,
        }
    }
}

/// Convert IdentityError to an HTTP response using the error envelope
impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({
            "status": "error",
            "error": ErrorBody::from(&self),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;
