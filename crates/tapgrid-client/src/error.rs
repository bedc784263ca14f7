//! Application-level errors.

use thiserror::Error;

/// Top-level application failures.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Key(#[from] tapgrid_keys::KeyError),

    #[error(transparent)]
    SessionKey(#[from] tapgrid_keys::SessionKeyError),

    #[error(transparent)]
    Feed(#[from] tapgrid_feed::FeedError),

    #[error(transparent)]
    Executor(#[from] tapgrid_executor::ExecutorError),

    #[error(transparent)]
    SessionService(#[from] tapgrid_executor::SessionServiceError),

    #[error(transparent)]
    Relayer(#[from] tapgrid_executor::RelayerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for application operations.
pub type AppResult<T> = std::result::Result<T, AppError>;
