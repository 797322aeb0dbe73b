use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct EthResponse<T> {
    data: T,
}

impl<T: Serialize> IntoResponse for EthResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl<T> EthResponse<T> {
    pub const fn json(data: T) -> Self {
        Self { data }
    }
}
