//! Handlers for the subset of the [Eth Beacon Node API] served by the archiver.
//!
//! [Eth Beacon Node API]: https://ethereum.github.io/beacon-APIs/

// `axum` handlers must be `async` even when they never suspend.
#![allow(clippy::unused_async)]

use anyhow::Context as _;
use archive_store::Archive;
use axum::{extract::State, http::StatusCode, Json};
use beacon_api::BeaconNode;
use blob_resolver::{HealthStatus, Resolver};
use serde::Deserialize;
use types::{block_id::BlockId, containers::BlobSidecar, primitives::BlobIndex};

use crate::{
    error::Error,
    extractors::{EthPath, EthQuery},
    response::EthResponse,
};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlobSidecarsQuery {
    // Each value may hold several comma-separated indices.
    #[serde(default)]
    indices: Vec<String>,
}

impl BlobSidecarsQuery {
    fn indices(&self) -> Result<Option<Vec<BlobIndex>>, Error> {
        if self.indices.is_empty() {
            return Ok(None);
        }

        self.indices
            .iter()
            .flat_map(|value| value.split(','))
            .map(|index| {
                index
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid blob index: {index:?}"))
                    .map_err(Error::InvalidQuery)
            })
            .collect::<Result<_, _>>()
            .map(Some)
    }
}

/// `GET /eth/v1/beacon/blob_sidecars/{block_id}`
pub async fn blob_sidecars<B: BeaconNode + 'static, A: Archive + 'static>(
    State(resolver): State<Resolver<B, A>>,
    EthPath(block_id): EthPath<BlockId>,
    EthQuery(query): EthQuery<BlobSidecarsQuery>,
) -> Result<EthResponse<Vec<BlobSidecar>>, Error> {
    let indices = query.indices()?;
    let sidecar_set = resolver.resolve(block_id).await?;

    let sidecars = match indices {
        Some(indices) => sidecar_set.filter_indices(&indices).cloned().collect(),
        None => sidecar_set.sidecars.clone(),
    };

    Ok(EthResponse::json(sidecars))
}

/// `GET /healthz`
pub async fn health<B: BeaconNode + 'static, A: Archive + 'static>(
    State(resolver): State<Resolver<B, A>>,
) -> (StatusCode, Json<HealthStatus>) {
    let status = resolver.health();

    let status_code = if status.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(status))
}
