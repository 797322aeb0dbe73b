use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use archive_store::{ArchiveStore, ArchiveStoreConfig};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use beacon_api::BeaconNode;
use blob_resolver::{CoalescingRegistry, Resolver, ResolverConfig};
use clock::{ManualSlotClock, SlotClock};
use database::Database;
use serde_json::{json, Value};
use test_case::test_case;
use tower::ServiceExt as _;
use tower_http::cors::AllowOrigin;
use types::{
    block_id::{BlockId, BlockTag},
    containers::{BeaconBlockHeader, BlobSidecar, SignedBeaconBlockHeader},
    nonstandard::{BlobSidecarSet, CanonicalRecord},
    primitives::{H256, Slot},
    source::{SidecarSource, SourceError, SourceKind},
};

use crate::{middleware, routing};

const HEAD_SLOT: Slot = 1000;
const HEAD_ROOT: H256 = H256::repeat_byte(0xaa);

// A beacon node that only knows a single block with 3 blobs.
#[derive(Default)]
struct SingleBlockNode {
    offline: AtomicBool,
}

impl SingleBlockNode {
    fn check(&self) -> Result<(), SourceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SourceError::source_unavailable(anyhow!("connection refused")));
        }

        Ok(())
    }
}

#[async_trait]
impl SidecarSource for SingleBlockNode {
    fn kind(&self) -> SourceKind {
        SourceKind::BeaconNode
    }

    async fn sidecars(&self, root: H256) -> Result<BlobSidecarSet, SourceError> {
        self.check()?;

        if root != HEAD_ROOT {
            return Err(SourceError::NotFound);
        }

        let signed_block_header = SignedBeaconBlockHeader {
            message: BeaconBlockHeader {
                slot: HEAD_SLOT,
                ..BeaconBlockHeader::default()
            },
            ..SignedBeaconBlockHeader::default()
        };

        let sidecars = (0..3)
            .map(|index| BlobSidecar {
                index,
                blob: vec![0xbb; 4],
                signed_block_header,
                ..BlobSidecar::default()
            })
            .collect();

        Ok(BlobSidecarSet::new(root, HEAD_SLOT, sidecars))
    }
}

#[async_trait]
impl BeaconNode for SingleBlockNode {
    async fn header(&self, block_id: BlockId) -> Result<CanonicalRecord, SourceError> {
        self.check()?;

        match block_id {
            BlockId::Tag(BlockTag::Head) | BlockId::Slot(HEAD_SLOT) => {}
            BlockId::Root(root) if root == HEAD_ROOT => {}
            _ => return Err(SourceError::NotFound),
        }

        Ok(CanonicalRecord {
            slot: HEAD_SLOT,
            root: HEAD_ROOT,
            parent_root: H256::zero(),
            canonical: true,
            observed_at: 0,
        })
    }
}

fn router() -> (Router, Arc<SingleBlockNode>) {
    let beacon_node = Arc::new(SingleBlockNode::default());
    let database = Arc::new(Database::in_memory());
    let archive = Arc::new(ArchiveStore::new(database, ArchiveStoreConfig::default()));

    let resolver = Resolver::new(
        Arc::clone(&beacon_node),
        archive,
        Arc::new(CoalescingRegistry::new()),
        Arc::new(ManualSlotClock::new(HEAD_SLOT)) as Arc<dyn SlotClock>,
        ResolverConfig::default(),
    );

    let router = middleware::extend_router_with_middleware(
        routing::normal_routes(resolver),
        None,
        AllowOrigin::any(),
    );

    (router, beacon_node)
}

async fn get(router: Router, uri: &str) -> Result<(StatusCode, Value)> {
    let request = Request::get(uri).body(Body::empty())?;
    let response = router.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;

    Ok((status, serde_json::from_slice(&bytes)?))
}

fn returned_indices(body: &Value) -> Vec<Value> {
    body["data"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|sidecar| sidecar["index"].clone())
        .collect()
}

#[test_case("/eth/v1/beacon/blob_sidecars/head", json!(["0", "1", "2"]))]
#[test_case("/eth/v1/beacon/blob_sidecars/1000", json!(["0", "1", "2"]))]
#[test_case(
    "/eth/v1/beacon/blob_sidecars/0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
    json!(["0", "1", "2"])
)]
#[test_case("/eth/v1/beacon/blob_sidecars/head?indices=0,2", json!(["0", "2"]))]
#[test_case("/eth/v1/beacon/blob_sidecars/head?indices=2&indices=0", json!(["0", "2"]))]
#[test_case("/eth/v1/beacon/blob_sidecars/head?indices=1,7", json!(["1"]))]
#[tokio::test]
async fn blob_sidecars_are_served(uri: &str, expected_indices: Value) -> Result<()> {
    let (router, _) = router();

    let (status, body) = get(router, uri).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json!(returned_indices(&body)), expected_indices);

    Ok(())
}

#[test_case("/eth/v1/beacon/blob_sidecars/999", StatusCode::NOT_FOUND)]
#[test_case("/eth/v1/beacon/blob_sidecars/latest", StatusCode::BAD_REQUEST)]
#[test_case("/eth/v1/beacon/blob_sidecars/0x1234", StatusCode::BAD_REQUEST)]
#[test_case("/eth/v1/beacon/blob_sidecars/head?indices=x", StatusCode::BAD_REQUEST)]
#[test_case("/eth/v1/beacon/blob_sidecars/head?indices=1,,2", StatusCode::BAD_REQUEST)]
#[test_case("/eth/v1/beacon/blob_sidecars/head?index=1", StatusCode::BAD_REQUEST)]
#[tokio::test]
async fn errors_are_reported_in_json(uri: &str, expected_status: StatusCode) -> Result<()> {
    let (router, _) = router();

    let (status, body) = get(router, uri).await?;

    assert_eq!(status, expected_status);
    assert_eq!(body["code"], json!(expected_status.as_u16()));
    assert!(body["message"].is_string());

    Ok(())
}

#[tokio::test]
async fn unreachable_beacon_node_is_reported_as_unavailable() -> Result<()> {
    let (router, beacon_node) = router();

    beacon_node.offline.store(true, Ordering::SeqCst);

    let (status, body) = get(router.clone(), "/eth/v1/beacon/blob_sidecars/head").await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], json!(503));

    let (status, body) = get(router, "/healthz").await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"beacon_node": false, "archive": true}));

    Ok(())
}

#[tokio::test]
async fn healthz_reports_ready_service() -> Result<()> {
    let (router, _) = router();

    let (status, body) = get(router, "/healthz").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"beacon_node": true, "archive": true}));

    Ok(())
}
