//! Custom extractors for the [Eth Beacon Node API].
//!
//! The extractors provided by `axum` report errors in plain text with various status codes.
//! The [Eth Beacon Node API] requires errors to be reported in JSON with the 400 status code.
//!
//! [Eth Beacon Node API]: https://ethereum.github.io/beacon-APIs/

use anyhow::Error as AnyhowError;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
    RequestPartsExt as _,
};
use axum_extra::extract::Query;
use serde::de::DeserializeOwned;
use types::block_id::BlockId;

use crate::error::Error;

// Parsed with `FromStr` rather than `DeserializeOwned` to make error messages more specific.
pub struct EthPath<T>(pub T);

impl<S: Sync> FromRequestParts<S> for EthPath<BlockId> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extract::<Path<String>>()
            .await
            .map_err(AnyhowError::new)
            .map_err(Error::InvalidBlockId)?
            .parse()
            .map(Self)
            .map_err(AnyhowError::new)
            .map_err(Error::InvalidBlockId)
    }
}

pub struct EthQuery<T>(pub T);

impl<S: Sync, T: DeserializeOwned + 'static> FromRequestParts<S> for EthQuery<T> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extract()
            .await
            .map(|Query(query)| Self(query))
            .map_err(AnyhowError::new)
            .map_err(Error::InvalidQuery)
    }
}
