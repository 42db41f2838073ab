use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stockdash_core::errors::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::InvalidConfigValue(_)) => StatusCode::BAD_REQUEST,
            // Upstream hiccups are worth retrying; anything else is a bad answer.
            ApiError::Core(CoreError::MarketData(e)) if e.is_transient() => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Core(CoreError::MarketData(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Core(CoreError::Database(_) | CoreError::Unexpected(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
