use core::time::Duration;
use std::sync::Arc;

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    http::{Request, StatusCode},
    response::Response,
    BoxError, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, Span};

use crate::error::Error;

pub fn extend_router_with_middleware(
    mut router: Router,
    timeout: Option<Duration>,
    allowed_origins: AllowOrigin,
) -> Router {
    if let Some(timeout) = timeout {
        router = router.layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|_: BoxError| async {
                    StatusCode::REQUEST_TIMEOUT
                }))
                .timeout(timeout),
        );
    }

    router
        .layer(CorsLayer::new().allow_origin(allowed_origins).vary([]))
        .layer(
            TraceLayer::new_for_http()
                .on_request(log_request)
                .on_response(log_response),
        )
}

fn log_request(request: &Request<Body>, _span: &Span) {
    let method = request.method();
    let uri = request.uri();
    let version = request.version();

    debug!("received request ({method} {uri} {version:?})");
}

fn log_response(response: &Response, latency: Duration, _span: &Span) {
    let status = response.status();

    match response.extensions().get::<Arc<Error>>() {
        Some(error) => info!(
            "produced response ({status}) in {latency:?} (error: {})",
            error.format_sources(),
        ),
        None => debug!("produced response ({status}) in {latency:?}"),
    }
}
