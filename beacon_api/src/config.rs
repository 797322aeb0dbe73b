use core::time::Duration;

use types::redacting_url::RedactingUrl;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BeaconApiConfig {
    pub urls: Vec<RedactingUrl>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl BeaconApiConfig {
    #[must_use]
    pub fn with_urls(urls: impl IntoIterator<Item = RedactingUrl>) -> Self {
        Self {
            urls: urls.into_iter().collect(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Delay before retry number `attempt` (counting from 0).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2_u32.saturating_pow(attempt))
    }
}
