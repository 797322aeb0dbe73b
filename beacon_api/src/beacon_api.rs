use std::time::SystemTime;

use anyhow::{Error as AnyhowError, Result};
use async_trait::async_trait;
use mime::APPLICATION_JSON;
use reqwest::{header::ACCEPT, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use types::{
    block_id::{BlockId, BlockTag},
    nonstandard::{BlobSidecarSet, CanonicalRecord},
    primitives::{H256, Slot, UnixSeconds},
    source::{SidecarSource, SourceError, SourceKind},
};

use crate::{
    config::BeaconApiConfig,
    endpoints::{Endpoint, EndpointStatus, Endpoints},
    responses::{BlobSidecarsResponse, HeaderResponse},
};

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum BeaconApiError {
    #[error("no beacon node endpoints configured")]
    NoEndpointsProvided,
    #[error("beacon node returned {status} (beacon node response: {message})")]
    ServerError { status: StatusCode, message: String },
    #[error("all beacon node endpoints failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Live view of the chain as reported by a beacon node.
#[async_trait]
pub trait BeaconNode: SidecarSource {
    async fn header(&self, block_id: BlockId) -> Result<CanonicalRecord, SourceError>;

    async fn resolve_tag(&self, tag: BlockTag) -> Result<(Slot, H256), SourceError> {
        let record = self.header(tag.into()).await?;
        Ok((record.slot, record.root))
    }
}

enum Failure {
    Transient(AnyhowError),
    Permanent(SourceError),
}

pub struct BeaconApi {
    client: Client,
    config: BeaconApiConfig,
    endpoints: Mutex<Endpoints>,
}

impl BeaconApi {
    #[must_use]
    pub fn new(client: Client, config: BeaconApiConfig) -> Self {
        let endpoints = Mutex::new(Endpoints::new(config.urls.iter().cloned()));

        Self {
            client,
            config,
            endpoints,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        block_id: BlockId,
    ) -> Result<T, SourceError> {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let Some(endpoint) = self.current_endpoint().await else {
                return Err(SourceError::source_unavailable(
                    BeaconApiError::NoEndpointsProvided,
                ));
            };

            match self.request(&endpoint, path, block_id).await {
                Ok(response) => {
                    self.set_endpoint_status(EndpointStatus::Online).await;
                    return Ok(response);
                }
                Err(Failure::Permanent(error)) => {
                    // The node answered, so it is reachable even if the block is not there.
                    self.set_endpoint_status(EndpointStatus::Online).await;
                    return Err(error);
                }
                Err(Failure::Transient(error)) => {
                    let url = endpoint.url();

                    match self.peek_next_endpoint().await {
                        Some(next_endpoint) if next_endpoint.url() != url => warn!(
                            "beacon node endpoint {url} returned an error: {error:#}; \
                             switching to {}",
                            next_endpoint.url(),
                        ),
                        _ => warn!(
                            "last available beacon node endpoint {url} returned an error: \
                             {error:#}",
                        ),
                    }

                    self.set_endpoint_status(EndpointStatus::Offline).await;
                    self.advance_endpoint().await;

                    last_error = Some(error);

                    if attempt.saturating_add(1) < attempts {
                        tokio::time::sleep(self.config.backoff(attempt)).await;
                    }
                }
            }
        }

        let exhausted = BeaconApiError::RetriesExhausted { attempts };

        let error = match last_error {
            Some(error) => error.context(exhausted),
            None => exhausted.into(),
        };

        Err(SourceError::source_unavailable(error))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        path: &str,
        block_id: BlockId,
    ) -> Result<T, Failure> {
        let url = endpoint
            .url()
            .join_path(path)
            .map_err(|error| Failure::Permanent(SourceError::source_unavailable(error)))?;

        debug!("requesting {url}");

        let response = self
            .client
            .get(url.into_url())
            .timeout(self.config.request_timeout)
            .header(ACCEPT, APPLICATION_JSON.as_ref())
            .send()
            .await
            .map_err(|error| Failure::Transient(error.into()))?;

        let response = handle_error(response, block_id).await?;

        // A body that does not decode will not decode on the next attempt either.
        response
            .json()
            .await
            .map_err(|error| Failure::Permanent(SourceError::source_unavailable(error)))
    }

    async fn current_endpoint(&self) -> Option<Endpoint> {
        self.endpoints.lock().await.current_or_first().cloned()
    }

    async fn peek_next_endpoint(&self) -> Option<Endpoint> {
        self.endpoints.lock().await.peek_next().cloned()
    }

    async fn set_endpoint_status(&self, status: EndpointStatus) {
        self.endpoints.lock().await.set_status(status);
    }

    async fn advance_endpoint(&self) {
        self.endpoints.lock().await.advance();
    }
}

#[async_trait]
impl SidecarSource for BeaconApi {
    fn kind(&self) -> SourceKind {
        SourceKind::BeaconNode
    }

    async fn sidecars(&self, root: H256) -> Result<BlobSidecarSet, SourceError> {
        let block_id = BlockId::Root(root);
        let path = format!("/eth/v1/beacon/blob_sidecars/{block_id}");
        let response = self.get_json::<BlobSidecarsResponse>(&path, block_id).await?;

        let slot = match response.data.first() {
            Some(sidecar) => sidecar.slot(),
            None => self.header(block_id).await?.slot,
        };

        Ok(BlobSidecarSet::new(root, slot, response.data))
    }
}

#[async_trait]
impl BeaconNode for BeaconApi {
    async fn header(&self, block_id: BlockId) -> Result<CanonicalRecord, SourceError> {
        let path = format!("/eth/v1/beacon/headers/{block_id}");
        let response = self.get_json::<HeaderResponse>(&path, block_id).await?;
        let data = response.data;

        Ok(CanonicalRecord {
            slot: data.header.message.slot,
            root: data.root,
            parent_root: data.header.message.parent_root,
            canonical: data.canonical,
            observed_at: unix_now(),
        })
    }
}

async fn handle_error(response: Response, block_id: BlockId) -> Result<Response, Failure> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(Failure::Permanent(SourceError::NotFound));
    }

    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        let message = response.text().await.unwrap_or_default();

        debug!("beacon node rejected {block_id}: {message}");

        let error = match block_id {
            BlockId::Tag(tag) => SourceError::InvalidTag(tag),
            BlockId::Slot(_) | BlockId::Root(_) => SourceError::InvalidIdentifier(block_id),
        };

        return Err(Failure::Permanent(error));
    }

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        let error = BeaconApiError::ServerError { status, message };
        return Err(Failure::Transient(error.into()));
    }

    Ok(response)
}

fn unix_now() -> UnixSeconds {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}
