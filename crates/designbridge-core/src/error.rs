//! Unified Error Model
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DesignBridgeError {
    /// Missing credentials or unusable settings.
    #[error("CONFIG/{0}")]
    Config(String),

    /// An external call failed before a response was read.
    #[error("TRANSPORT/{0}")]
    Transport(String),

    /// Local model inference failed.
    #[error("INFERENCE/{0}")]
    Inference(String),

    /// A response arrived but did not have the expected shape.
    #[error("RESPONSE/{0}")]
    MalformedResponse(String),

    #[error("IO/{0}")]
    Io(#[from] std::io::Error),

    /// Structural defect in the workflow graph.
    #[error("GRAPH/{0}")]
    Graph(String),
}

impl From<serde_json::Error> for DesignBridgeError {
    fn from(err: serde_json::Error) -> Self {
        DesignBridgeError::MalformedResponse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DesignBridgeError>;
