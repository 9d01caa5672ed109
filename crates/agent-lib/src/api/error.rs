//! Request errors

use crate::models::EventError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors reported synchronously to the caller
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid scope {0:?}: expected \"stats\" or \"events\"")]
    InvalidScope(String),

    #[error("bad json: {0}")]
    MalformedJson(String),

    #[error(transparent)]
    InvalidEvent(#[from] EventError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidScope(_) | ApiError::MalformedJson(_) | ApiError::InvalidEvent(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
