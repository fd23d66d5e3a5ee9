//! Runner error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] swr_models::RequestError),

    #[error("streetwarp produced no result")]
    NoResult,

    #[error("segment download failed: {0}")]
    FetchFailed(String),

    #[error("job timed out after {0} seconds")]
    Timeout(u64),

    #[error(transparent)]
    Exec(#[from] swr_media::ExecError),

    #[error(transparent)]
    Storage(#[from] swr_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn fetch_failed(msg: impl Into<String>) -> Self {
        Self::FetchFailed(msg.into())
    }
}
