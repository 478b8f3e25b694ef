use reqwest::StatusCode;
use std::fmt;

/// Errors produced by the Prosper client and the analysis helpers.
#[derive(Debug)]
pub enum ProsperError {
    /// The token endpoint answered with something other than 200.
    AuthenticationFailed {
        /// Status returned by the token endpoint.
        status: StatusCode,
        /// Response body, kept for diagnostics.
        body: String,
    },
    /// An authenticated call was attempted before a token was acquired.
    NotAuthenticated,
    /// The caller passed an argument the API cannot accept.
    InvalidArgument(String),
    /// Network, HTTP status or decoding failure from the transport.
    Transport(reqwest::Error),
    /// A record was missing a field or carried a value we cannot interpret.
    MalformedRecord(String),
}

impl fmt::Display for ProsperError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProsperError::AuthenticationFailed { status, body } => {
                write!(f, "Could not acquire token ({}): {}", status, body)
            }
            ProsperError::NotAuthenticated => write!(
                f,
                "Client is not authenticated; call `authenticate` before making requests"
            ),
            ProsperError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            ProsperError::Transport(e) => write!(f, "Transport error: {}", e),
            ProsperError::MalformedRecord(msg) => write!(f, "Malformed record: {}", msg),
        }
    }
}

impl std::error::Error for ProsperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProsperError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProsperError {
    /// Converts a `reqwest::Error` into a `ProsperError`.
    fn from(err: reqwest::Error) -> Self {
        ProsperError::Transport(err)
    }
}

pub type Result<T> = std::result::Result<T, ProsperError>;
