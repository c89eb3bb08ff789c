//! Error types.

use http::StatusCode;

/// Result alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type shared by the record store, the lookup client and the handlers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Region code is not one of the supported regions.
    #[error("invalid region `{0}`")]
    InvalidRegion(String),
    /// The Riot API has no summoner with this name.
    #[error("summoner `{name}` not found in region `{region}`")]
    NotFound {
        /// Region code.
        region: String,
        /// Name as requested.
        name: String,
    },
    /// Non-success (other than 404) response, transport failure or bad body from the Riot API.
    #[error("riot api request failed (status {status:?}): {message}")]
    ExternalService {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Response body or failure description.
        message: String,
    },
    /// Storage operation failed.
    #[error("{operation} failed: {message}")]
    Persistence {
        /// Which store operation.
        operation: &'static str,
        /// Underlying error.
        message: String,
    },
    /// A stored row could not be parsed.
    #[error("malformed record at index {index} (key {key:?}): {reason}")]
    MalformedRecord {
        /// Position of the row within its batch.
        index: usize,
        /// Primary key of the row, if it had a readable one.
        key: Option<String>,
        /// Parse failure.
        reason: String,
    },
    /// Query arguments rejected before reaching the store.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// Missing or invalid environment configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wraps a [`worker::Error`] raised by a store operation.
    pub fn persistence(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            operation,
            message: err.to_string(),
        }
    }

    /// HTTP status used when this error reaches a client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRegion(_) | Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::ExternalService { .. }
            | Error::Persistence { .. }
            | Error::MalformedRecord { .. }
            | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients. Internal failures are not described.
    pub fn public_message(&self) -> String {
        match self {
            Error::InvalidRegion(_) => "Invalid 'region' query parameter".to_owned(),
            Error::InvalidQuery(msg) => msg.clone(),
            Error::NotFound { .. } => "Summoner not found".to_owned(),
            _ => "Internal server error".to_owned(),
        }
    }
}

impl From<Error> for worker::Error {
    fn from(value: Error) -> Self {
        worker::Error::RustError(value.to_string())
    }
}
