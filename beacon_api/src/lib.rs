pub use crate::{
    beacon_api::{BeaconApi, BeaconApiError, BeaconNode},
    config::{
        BeaconApiConfig, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_BACKOFF,
    },
};

mod beacon_api;
mod config;
mod endpoints;
mod responses;
