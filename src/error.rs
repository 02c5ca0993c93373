//! Error types for YantraIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// YantraIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level connection error
    #[error("Connection error: {0}")]
    Connection(#[from] crate::transport::ConnError),

    /// Brick command/reply codec error
    #[error("Protocol error: {0}")]
    Protocol(#[from] crate::protocol::ProtocolError),

    /// Dead-reckoning failure
    #[error("Navigation error: {0}")]
    Nav(#[from] crate::nav::NavError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration serialization error
    #[error("Config serialization error: {0}")]
    ConfigSer(#[from] toml::ser::Error),

    /// Communication timeout
    #[error("Communication timeout")]
    Timeout,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
