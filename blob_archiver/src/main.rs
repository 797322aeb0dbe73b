use core::future::Future;
use std::{process::ExitCode, sync::Arc};

use anyhow::Result;
use archive_store::ArchiveStore;
use beacon_api::BeaconApi;
use blob_resolver::{CoalescingRegistry, Resolver};
use clap::{Error as ClapError, Parser as _};
use clock::{SlotClock, SystemSlotClock};
use database::Database;
use http_api::HttpApi;
use reqwest::Client;
use sweeper::Sweeper;
use tokio::{runtime::Builder, select};
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::SignalKind;

use crate::{blob_archiver_args::BlobArchiverArgs, blob_archiver_config::BlobArchiverConfig};

mod blob_archiver_args;
mod blob_archiver_config;
mod predefined_network;

const ARCHIVE_DB_NAME: &str = "blob_archive";

fn main() -> ExitCode {
    if let Err(error) = try_main() {
        error.downcast_ref().map(ClapError::exit);
        error!("{error:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    binary_utils::initialize_tracing_logger(
        module_path!(),
        cfg!(feature = "logger-always-write-style"),
    )?;

    let config = BlobArchiverArgs::try_parse()?
        .try_into_config()
        .map_err(BlobArchiverArgs::clap_error)?;

    info!("starting blob archiver");
    config.report();

    block_on(run(config))
}

async fn run(config: BlobArchiverConfig) -> Result<()> {
    let BlobArchiverConfig {
        genesis_time,
        seconds_per_slot,
        beacon_api_config,
        data_dir,
        archive_db_size,
        archive_store_config,
        http_api_config,
        resolver_config,
        sweeper_config,
        ..
    } = config;

    let database = match data_dir {
        Some(directory) => Database::persistent(ARCHIVE_DB_NAME, directory, archive_db_size)?,
        None => Database::in_memory(),
    };

    // Timeouts are applied per request by `BeaconApi`.
    let client = Client::builder().build()?;

    let beacon_api = Arc::new(BeaconApi::new(client, beacon_api_config));
    let archive = Arc::new(ArchiveStore::new(Arc::new(database), archive_store_config));
    let clock = Arc::new(SystemSlotClock::new(genesis_time, seconds_per_slot));

    let resolver = Resolver::new(
        beacon_api,
        archive,
        Arc::new(CoalescingRegistry::new()),
        clock as Arc<dyn SlotClock>,
        resolver_config,
    );

    let sweeper = Sweeper::new(resolver.clone(), sweeper_config);

    let http_api = HttpApi {
        resolver,
        http_api_config,
    };

    select! {
        result = spawn_fallible(http_api.run()) => result,
        result = spawn_fallible(sweeper.run()) => result,
        result = wait_for_signal() => {
            info!("received shutdown signal");
            result
        }
    }
}

async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut interrupt = tokio::signal::unix::signal(SignalKind::interrupt())?;
        let mut terminate = tokio::signal::unix::signal(SignalKind::terminate())?;

        select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

// This exists mainly to flatten the nested `Result` returned by `tokio::spawn`.
async fn spawn_fallible<T: Send + 'static>(
    task: impl Future<Output = Result<T>> + Send + 'static,
) -> Result<T> {
    tokio::spawn(task).await?
}

fn block_on(future: impl Future<Output = Result<()>>) -> Result<()> {
    Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(future)
}
