use anyhow::Result;
use archive_store::Archive;
use beacon_api::BeaconNode;
use blob_resolver::Resolver;
use tracing::{info, instrument};

use crate::{http_api_config::HttpApiConfig, middleware, routing};

pub struct HttpApi<B, A> {
    pub resolver: Resolver<B, A>,
    pub http_api_config: HttpApiConfig,
}

impl<B: BeaconNode + 'static, A: Archive + 'static> HttpApi<B, A> {
    #[instrument(parent = None, skip(self), fields(address = %self.http_api_config.address))]
    pub async fn run(self) -> Result<()> {
        let Self {
            resolver,
            http_api_config,
        } = self;

        let listener = http_api_config.listener().await?;

        let HttpApiConfig {
            allow_origin,
            timeout,
            ..
        } = http_api_config;

        let router = routing::normal_routes(resolver);
        let router = middleware::extend_router_with_middleware(router, timeout, allow_origin);

        info!("HTTP server listening on {}", listener.local_addr()?);

        axum::serve(listener, router).await.map_err(Into::into)
    }
}
