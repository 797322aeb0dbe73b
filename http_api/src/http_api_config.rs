use core::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::Result;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::cors::AllowOrigin;

pub const DEFAULT_HTTP_API_PORT: u16 = 5052;

#[derive(Clone, Debug)]
pub struct HttpApiConfig {
    pub address: SocketAddr,
    pub allow_origin: AllowOrigin,
    // `HttpApiConfig.timeout` is optional to prevent timeouts in tests.
    pub timeout: Option<Duration>,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self::with_address(Ipv4Addr::LOCALHOST, DEFAULT_HTTP_API_PORT)
    }
}

impl HttpApiConfig {
    #[must_use]
    pub fn with_address(ip_address: impl Into<IpAddr>, port: u16) -> Self {
        let address = (ip_address, port).into();

        // A socket address always forms a valid header value.
        let allowed_origin = HeaderValue::from_str(&format!("http://{address}")).ok();

        Self {
            address,
            allow_origin: AllowOrigin::list(allowed_origin),
            timeout: None,
        }
    }

    pub(crate) async fn listener(&self) -> Result<TcpListener> {
        TcpListener::bind(self.address).await.map_err(Into::into)
    }
}
