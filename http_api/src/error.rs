use core::{error::Error as StdError, fmt::Display};
use std::sync::Arc;

use anyhow::Error as AnyhowError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use blob_resolver::Error as ResolverError;
use itertools::Itertools as _;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid block ID")]
    InvalidBlockId(#[source] AnyhowError),
    #[error("invalid query string")]
    InvalidQuery(#[source] AnyhowError),
    #[error(transparent)]
    Resolution(#[from] ResolverError),
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.format_sources())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let body = Json(self.body()).into_response();
        let extension = Extension(Arc::new(self));
        (status_code, extension, body).into_response()
    }
}

impl Error {
    // Impls generated by `thiserror::Error` ignore the alternate flag,
    // so the chain of sources has to be formatted by hand.
    pub fn format_sources(&self) -> impl Display + '_ {
        self.sources().format(": ")
    }

    fn sources(&self) -> impl Iterator<Item = &dyn StdError> {
        let mut error: Option<&dyn StdError> = Some(self);

        core::iter::from_fn(move || {
            let source = error?.source();
            core::mem::replace(&mut error, source)
        })
    }

    const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBlockId(_)
            | Self::InvalidQuery(_)
            | Self::Resolution(ResolverError::InvalidIdentifier(_)) => StatusCode::BAD_REQUEST,
            Self::Resolution(ResolverError::NotFound) => StatusCode::NOT_FOUND,
            Self::Resolution(ResolverError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Resolution(ResolverError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn body(&self) -> EthErrorResponse {
        EthErrorResponse {
            code: self.status_code().as_u16(),
            message: self,
        }
    }
}

#[derive(Serialize)]
struct EthErrorResponse<'error> {
    // The `code` field is supposed to contain a number.
    code: u16,
    message: &'error Error,
}
