use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Malformed topology: {0}")]
    MalformedTopology(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
