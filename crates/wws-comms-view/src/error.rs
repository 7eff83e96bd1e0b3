use thiserror::Error;

use wws_comms_protocol::ProtocolError;

/// Errors surfaced by the comms view.
///
/// Cloneable so results can travel through the update channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Stream closed: {0}")]
    StreamClosed(String),
}

impl From<reqwest::Error> for ViewError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ViewError::Decode(e.to_string())
        } else {
            ViewError::Http(e.to_string())
        }
    }
}

impl From<url::ParseError> for ViewError {
    fn from(e: url::ParseError) -> Self {
        ViewError::InvalidUrl(e.to_string())
    }
}

impl From<ProtocolError> for ViewError {
    fn from(e: ProtocolError) -> Self {
        ViewError::Decode(e.to_string())
    }
}
