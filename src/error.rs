use thiserror::Error;

/// Error type for enumeration and hot-plug operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The platform notification subsystem could not be brought up
    /// (window creation, monitor socket, pipe, listener thread).
    #[error("Backend init failed: {0}")]
    BackendInit(String),
    /// The native device provider could not be queried.
    #[error("Enumeration failed: {0}")]
    Enumeration(String),
    /// The enumerator was shut down; it cannot be started again.
    #[error("Enumerator has been shut down")]
    ShutDown,
    /// Configuration file could not be parsed.
    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenient result alias for enumerator operations.
pub type Result<T> = std::result::Result<T, Error>;
