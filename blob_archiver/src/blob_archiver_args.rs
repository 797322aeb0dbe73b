use core::{fmt::Display, net::IpAddr, num::NonZeroU64, time::Duration};
use std::path::PathBuf;

use anyhow::{ensure, Result};
use archive_store::{ArchiveStoreConfig, DEFAULT_STORAGE_TIMEOUT};
use beacon_api::{
    BeaconApiConfig, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_BACKOFF,
};
use blob_resolver::{ResolverConfig, DEFAULT_RECENCY_WINDOW, DEFAULT_REQUEST_DEADLINE};
use bytesize::ByteSize;
use clap::{error::ErrorKind, Args, CommandFactory as _, Error as ClapError, Parser};
use http_api::HttpApiConfig;
use nonzero_ext::nonzero;
use reqwest::header::HeaderValue;
use sweeper::{SweeperConfig, DEFAULT_MAX_BACKFILL_SLOTS, DEFAULT_SWEEP_INTERVAL};
use thiserror::Error;
use tower_http::cors::AllowOrigin;
use tracing::warn;
use types::{primitives::UnixSeconds, redacting_url::RedactingUrl};

use crate::{blob_archiver_config::BlobArchiverConfig, predefined_network::PredefinedNetwork};

const APPLICATION_NAME: &str = "blob_archiver";
const DEFAULT_ARCHIVE_DB_SIZE: ByteSize = ByteSize::tib(1);
const DEFAULT_HTTP_API_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SECONDS_PER_SLOT: NonZeroU64 = nonzero!(12_u64);

/// Archive of Eth2 blob sidecars
/// Serves `GET /eth/v1/beacon/blob_sidecars/{block_id}` long after beacon nodes have pruned them
#[derive(Parser)]
#[clap(display_name = APPLICATION_NAME, verbatim_doc_comment, version)]
pub struct BlobArchiverArgs {
    #[clap(flatten)]
    chain_options: ChainOptions,

    #[clap(flatten)]
    beacon_node_options: BeaconNodeOptions,

    #[clap(flatten)]
    storage_options: StorageOptions,

    #[clap(flatten)]
    http_api_options: HttpApiOptions,

    #[clap(flatten)]
    resolver_options: ResolverOptions,

    #[clap(flatten)]
    sweeper_options: SweeperOptions,
}

#[derive(Args)]
struct ChainOptions {
    /// Name of the Eth2 network to archive blob sidecars of
    #[clap(long, value_enum, default_value_t = PredefinedNetwork::default())]
    network: PredefinedNetwork,

    /// Genesis time of the network in seconds since the Unix epoch.
    /// Overrides the genesis time of --network.
    #[clap(long)]
    genesis_time: Option<UnixSeconds>,

    /// Duration of a slot in seconds
    #[clap(long, default_value_t = DEFAULT_SECONDS_PER_SLOT)]
    seconds_per_slot: NonZeroU64,
}

#[derive(Args)]
struct BeaconNodeOptions {
    /// List of Eth Beacon Node API URLs.
    /// URLs after the first one are used as fallbacks.
    #[clap(long, required = true, num_args = 1.., value_delimiter = ',')]
    beacon_node_urls: Vec<RedactingUrl>,

    /// Timeout of a single beacon node request in milliseconds
    #[clap(long, default_value_t = millis(DEFAULT_REQUEST_TIMEOUT))]
    beacon_node_request_timeout: u64,

    /// Number of times a transient beacon node failure is retried
    #[clap(long, default_value_t = DEFAULT_MAX_RETRIES)]
    beacon_node_max_retries: u32,

    /// Delay before the first retry in milliseconds. Doubled on every subsequent retry.
    #[clap(long, default_value_t = millis(DEFAULT_RETRY_BACKOFF))]
    beacon_node_retry_backoff: u64,
}

impl From<BeaconNodeOptions> for BeaconApiConfig {
    fn from(beacon_node_options: BeaconNodeOptions) -> Self {
        let BeaconNodeOptions {
            beacon_node_urls,
            beacon_node_request_timeout,
            beacon_node_max_retries,
            beacon_node_retry_backoff,
        } = beacon_node_options;

        Self {
            request_timeout: Duration::from_millis(beacon_node_request_timeout),
            max_retries: beacon_node_max_retries,
            retry_backoff: Duration::from_millis(beacon_node_retry_backoff),
            ..Self::with_urls(beacon_node_urls)
        }
    }
}

#[derive(Args)]
struct StorageOptions {
    /// Directory to store the archive in.
    /// The archive is kept in memory and lost on exit if this is not specified.
    #[clap(long, value_name = "DIRECTORY")]
    data_dir: Option<PathBuf>,

    /// Max size of the archive database
    #[clap(long, default_value_t = DEFAULT_ARCHIVE_DB_SIZE)]
    archive_db_size: ByteSize,

    /// Timeout of a single storage operation in milliseconds
    #[clap(long, default_value_t = millis(DEFAULT_STORAGE_TIMEOUT))]
    storage_timeout: u64,
}

#[derive(Args)]
struct HttpApiOptions {
    /// HTTP API address
    #[clap(long, default_value_t = HttpApiConfig::default().address.ip())]
    http_address: IpAddr,

    /// HTTP API port
    #[clap(long, default_value_t = HttpApiConfig::default().address.port())]
    http_port: u16,

    /// List of Access-Control-Allow-Origin header values for the HTTP API server.
    /// Defaults to the listening URL of the HTTP API server.
    #[clap(long, value_delimiter = ',')]
    http_allowed_origins: Vec<HeaderValue>,

    /// HTTP API timeout in milliseconds
    #[clap(long, default_value_t = millis(DEFAULT_HTTP_API_TIMEOUT))]
    timeout: u64,
}

impl From<HttpApiOptions> for HttpApiConfig {
    fn from(http_api_options: HttpApiOptions) -> Self {
        let HttpApiOptions {
            http_address,
            http_port,
            http_allowed_origins,
            timeout,
        } = http_api_options;

        let Self {
            address,
            allow_origin,
            ..
        } = Self::with_address(http_address, http_port);

        Self {
            address,
            allow_origin: headers_to_allow_origin(http_allowed_origins).unwrap_or(allow_origin),
            timeout: Some(Duration::from_millis(timeout)),
        }
    }
}

#[derive(Args)]
struct ResolverOptions {
    /// Number of trailing slots whose blocks are re-confirmed with the beacon node
    /// before being served from the archive
    #[clap(long, default_value_t = DEFAULT_RECENCY_WINDOW)]
    recency_window_slots: u64,

    /// Deadline of a single blob sidecar request in milliseconds
    #[clap(long, default_value_t = millis(DEFAULT_REQUEST_DEADLINE))]
    request_deadline: u64,
}

#[derive(Args)]
struct SweeperOptions {
    /// Interval between consistency sweeps in seconds
    #[clap(long, default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs())]
    sweep_interval: u64,

    /// Max number of slots before the recency window reconciled in a single sweep
    #[clap(long, default_value_t = DEFAULT_MAX_BACKFILL_SLOTS)]
    max_backfill_slots: u64,
}

impl BlobArchiverArgs {
    pub fn try_into_config(self) -> Result<BlobArchiverConfig> {
        let Self {
            chain_options,
            beacon_node_options,
            storage_options,
            http_api_options,
            resolver_options,
            sweeper_options,
        } = self;

        let ChainOptions {
            network,
            genesis_time,
            seconds_per_slot,
        } = chain_options;

        let StorageOptions {
            data_dir,
            archive_db_size,
            storage_timeout,
        } = storage_options;

        let ResolverOptions {
            recency_window_slots,
            request_deadline,
        } = resolver_options;

        let SweeperOptions {
            sweep_interval,
            max_backfill_slots,
        } = sweeper_options;

        ensure!(recency_window_slots > 0, Error::EmptyRecencyWindow);
        ensure!(request_deadline > 0, Error::ZeroRequestDeadline);
        ensure!(sweep_interval > 0, Error::ZeroSweepInterval);

        Ok(BlobArchiverConfig {
            predefined_network: network,
            genesis_time: genesis_time.unwrap_or_else(|| network.genesis_time()),
            seconds_per_slot,
            beacon_api_config: beacon_node_options.into(),
            data_dir,
            archive_db_size,
            archive_store_config: ArchiveStoreConfig {
                storage_timeout: Duration::from_millis(storage_timeout),
            },
            http_api_config: http_api_options.into(),
            resolver_config: ResolverConfig {
                recency_window: recency_window_slots,
                request_deadline: Duration::from_millis(request_deadline),
            },
            sweeper_config: SweeperConfig {
                sweep_interval: Duration::from_secs(sweep_interval),
                max_backfill_slots,
            },
        })
    }

    pub fn clap_error(message: impl Display) -> ClapError {
        Self::command().error(ErrorKind::ValueValidation, message)
    }
}

#[derive(Debug, Error)]
enum Error {
    #[error("--recency-window-slots must be greater than 0")]
    EmptyRecencyWindow,
    #[error("--request-deadline must be greater than 0")]
    ZeroRequestDeadline,
    #[error("--sweep-interval must be greater than 0")]
    ZeroSweepInterval,
}

// `Duration::as_millis` returns `u128`. See <https://github.com/rust-lang/rust/issues/58580>.
// `#[clap(value_parser = …)]` cannot be used because `Duration` does not implement `Display`.
fn millis(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

fn headers_to_allow_origin(allowed_origins: Vec<HeaderValue>) -> Option<AllowOrigin> {
    if allowed_origins.is_empty() {
        return None;
    }

    // `tower_http::cors::AllowOrigin::list` panics if a wildcard is passed to it.
    if allowed_origins.contains(&HeaderValue::from_static("*")) {
        if allowed_origins.len() > 1 {
            warn!(
                "extra values of Access-Control-Allow-Origin specified along with a wildcard; \
                 only the wildcard will be used",
            );
        }

        return Some(AllowOrigin::any());
    }

    Some(AllowOrigin::list(allowed_origins))
}
