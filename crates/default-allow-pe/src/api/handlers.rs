use axum::{
    body::Bytes,
    extract,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::{
    admission_review::AdmissionReview,
    api::{
        api_error::ApiError, populate_span_with_admission_request_data,
        populate_span_with_mutation_results, state::ApiServerState,
    },
    errors::{ReviewError, ValidationError},
    review,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Health {
    pub ready: bool,
}

#[tracing::instrument(
    name = "mutation",
    fields(
        request_uid=tracing::field::Empty,
        host=crate::config::HOSTNAME.as_str(),
        name=tracing::field::Empty,
        namespace=tracing::field::Empty,
        operation=tracing::field::Empty,
        kind_group=tracing::field::Empty,
        kind_version=tracing::field::Empty,
        kind=tracing::field::Empty,
        allowed=tracing::field::Empty,
        mutated=tracing::field::Empty,
        response_message=tracing::field::Empty,
    ),
    skip_all)]
/// Default `allowPrivilegeEscalation` on the containers of the Pod under review.
pub(crate) async fn mutate_handler(
    extract::State(state): extract::State<Arc<ApiServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AdmissionReview>, ApiError> {
    if !has_json_content_type(&headers) {
        return Err(ReviewError::from(ValidationError::InvalidContentType).into());
    }

    let admission_review = review::review(
        &state.scheme,
        &body,
        state.default_allow_privilege_escalation,
    )
    .map_err(|error| {
        debug!(error = ?error, "admission review rejected");
        ApiError::from(error)
    })?;

    if let Some(request) = &admission_review.request {
        populate_span_with_admission_request_data(request);
    }
    if let Some(response) = &admission_review.response {
        populate_span_with_mutation_results(response);
        debug!(response = ?response, "admission review processed");
    }

    Ok(Json(admission_review))
}

pub(crate) async fn healthz_handler() -> Json<Health> {
    Json(Health { ready: true })
}

/// Reply to unknown routes living under the `/api` prefix
pub(crate) async fn api_not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "code": StatusCode::NOT_FOUND.as_u16(),
            "status": StatusCode::NOT_FOUND.canonical_reason().unwrap_or_default(),
        })),
    )
}

pub(crate) async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        StatusCode::NOT_FOUND.canonical_reason().unwrap_or_default(),
    )
}

// Parameters like `charset` are not relevant
fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .is_some_and(|content_type| {
            content_type.essence_str() == mime::APPLICATION_JSON.essence_str()
        })
}
