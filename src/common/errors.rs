use std::time::Duration;

use thiserror::Error;

/// Raised when an operation is attempted at the wrong connection tier or the
/// transport refuses the connection. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("not connected to a server")]
    NoServer,
    #[error("not connected to a voice channel")]
    NoChannel,
    #[error("transport unreachable: {0}")]
    Unreachable(String),
    #[error("transport did not answer within {0:?}")]
    Timeout(Duration),
}

/// Failures inside the decode / effect chain.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("decoder error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),
    #[error("source i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported source layout: {0}")]
    Unsupported(String),
}

/// Outcome of a rejected load. The previously loaded pipeline stays active.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("failed to build pipeline: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Errors reported by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("authentication rejected: {0}")]
    Rejected(String),
    #[error("channel {0} not found or not joinable")]
    UnknownChannel(u64),
    #[error("transport closed")]
    Closed,
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error returned by the [`crate::engine::Engine`] handle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("engine task has shut down")]
    Closed,
}

impl From<TransportError> for ConnectionError {
    fn from(e: TransportError) -> Self {
        Self::Unreachable(e.to_string())
    }
}
