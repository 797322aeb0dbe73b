use archive_store::Archive;
use axum::{routing::get, Router};
use beacon_api::BeaconNode;
use blob_resolver::Resolver;

use crate::standard::{blob_sidecars, health};

pub fn normal_routes<B: BeaconNode + 'static, A: Archive + 'static>(
    resolver: Resolver<B, A>,
) -> Router {
    Router::new()
        .merge(eth_v1_routes())
        .route("/healthz", get(health::<B, A>))
        .with_state(resolver)
}

fn eth_v1_routes<B: BeaconNode + 'static, A: Archive + 'static>() -> Router<Resolver<B, A>> {
    Router::new().route(
        "/eth/v1/beacon/blob_sidecars/{block_id}",
        get(blob_sidecars::<B, A>),
    )
}
