pub use crate::{
    archive_store::{Archive, ArchiveStore},
    config::{ArchiveStoreConfig, DEFAULT_STORAGE_TIMEOUT},
};

mod archive_store;
mod config;
