use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::errors::ReviewError;

#[derive(Debug)]
/// An error that can be returned by the API
/// and will be converted into a JSON response.
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl From<ReviewError> for ApiError {
    fn from(error: ReviewError) -> Self {
        Self {
            status: error.status_code(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = json!({
            "error": self.message,
        });

        (self.status, axum::Json(payload)).into_response()
    }
}
