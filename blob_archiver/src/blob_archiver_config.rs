use core::num::NonZeroU64;
use std::path::PathBuf;

use archive_store::ArchiveStoreConfig;
use beacon_api::BeaconApiConfig;
use blob_resolver::ResolverConfig;
use bytesize::ByteSize;
use http_api::HttpApiConfig;
use sweeper::SweeperConfig;
use tracing::{info, warn};
use types::primitives::UnixSeconds;

use crate::predefined_network::PredefinedNetwork;

pub struct BlobArchiverConfig {
    pub predefined_network: PredefinedNetwork,
    pub genesis_time: UnixSeconds,
    pub seconds_per_slot: NonZeroU64,
    pub beacon_api_config: BeaconApiConfig,
    pub data_dir: Option<PathBuf>,
    pub archive_db_size: ByteSize,
    pub archive_store_config: ArchiveStoreConfig,
    pub http_api_config: HttpApiConfig,
    pub resolver_config: ResolverConfig,
    pub sweeper_config: SweeperConfig,
}

impl BlobArchiverConfig {
    pub fn report(&self) {
        let Self {
            predefined_network,
            genesis_time,
            seconds_per_slot,
            beacon_api_config,
            data_dir,
            archive_db_size,
            http_api_config,
            resolver_config,
            sweeper_config,
            ..
        } = self;

        info!(
            "network: {predefined_network} \
             (genesis time {genesis_time}, {seconds_per_slot} s per slot)",
        );

        for url in &beacon_api_config.urls {
            info!("beacon node: {url}");
        }

        match data_dir {
            Some(data_dir) => info!("archive directory: {data_dir:?} (up to {archive_db_size})"),
            None => {
                warn!("--data-dir not specified; archived blob sidecars will be kept in memory");
            }
        }

        info!("HTTP API address: {}", http_api_config.address);

        info!(
            "recency window: {} slots, request deadline: {:?}",
            resolver_config.recency_window, resolver_config.request_deadline,
        );

        info!(
            "sweep interval: {:?}, backfill limit: {} slots per sweep",
            sweeper_config.sweep_interval, sweeper_config.max_backfill_slots,
        );
    }
}
