use std::sync::Arc;

use anyhow::Error as AnyhowError;
use thiserror::Error;
use types::{block_id::BlockId, source::SourceError};

/// Outcome of a failed resolution.
///
/// Every caller attached to the same in-flight resolution receives a clone of the same value.
#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("blob sidecars not found")]
    NotFound,
    #[error("invalid block identifier: {0}")]
    InvalidIdentifier(BlockId),
    #[error("blob sidecars unavailable: {0:#}")]
    Unavailable(Arc<AnyhowError>),
    #[error("request deadline elapsed before blob sidecars were resolved")]
    Timeout,
}

impl From<SourceError> for Error {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::NotFound => Self::NotFound,
            SourceError::InvalidTag(tag) => Self::InvalidIdentifier(tag.into()),
            SourceError::InvalidIdentifier(block_id) => Self::InvalidIdentifier(block_id),
            SourceError::SourceUnavailable(_) | SourceError::StorageUnavailable(_) => {
                Self::unavailable(error)
            }
        }
    }
}

impl Error {
    pub fn unavailable(error: impl Into<AnyhowError>) -> Self {
        Self::Unavailable(Arc::new(error.into()))
    }
}
