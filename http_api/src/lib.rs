pub use crate::{
    http_api_config::{HttpApiConfig, DEFAULT_HTTP_API_PORT},
    task::HttpApi,
};

mod error;
mod extractors;
mod http_api_config;
mod middleware;
mod response;
mod routing;
mod standard;
mod task;

#[cfg(test)]
mod tests;
