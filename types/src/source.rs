use std::sync::Arc;

use anyhow::Error as AnyhowError;
use async_trait::async_trait;
use parse_display::Display;
use thiserror::Error;

use crate::{
    block_id::{BlockId, BlockTag},
    nonstandard::BlobSidecarSet,
    primitives::H256,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[display(style = "snake_case")]
pub enum SourceKind {
    BeaconNode,
    Archive,
}

/// Errors reported by the beacon node and archive adapters.
///
/// Causes are reference counted so that one failure can be handed to every caller
/// waiting on the same resolution.
#[derive(Clone, Debug, Error)]
pub enum SourceError {
    #[error("block not found")]
    NotFound,
    #[error("beacon node rejected block tag {0}")]
    InvalidTag(BlockTag),
    #[error("beacon node rejected block identifier {0}")]
    InvalidIdentifier(BlockId),
    #[error("beacon node unavailable: {0:#}")]
    SourceUnavailable(Arc<AnyhowError>),
    #[error("archive storage unavailable: {0:#}")]
    StorageUnavailable(Arc<AnyhowError>),
}

impl SourceError {
    pub fn source_unavailable(error: impl Into<AnyhowError>) -> Self {
        Self::SourceUnavailable(Arc::new(error.into()))
    }

    pub fn storage_unavailable(error: impl Into<AnyhowError>) -> Self {
        Self::StorageUnavailable(Arc::new(error.into()))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Whether the error says something about the reachability of the source
    /// rather than about the requested block.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_) | Self::StorageUnavailable(_))
    }
}

/// Anything that can produce the blob sidecars of a block root.
#[async_trait]
pub trait SidecarSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn sidecars(&self, root: H256) -> Result<BlobSidecarSet, SourceError>;
}
