use axum::http::StatusCode;
use thiserror::Error;

use crate::scheme::GroupVersionKind;

/// Errors raised while turning raw bytes into a registered object.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("couldn't get version/kind; json parse error: {0}")]
    TypeMeta(#[source] serde_json::Error),

    #[error("Object 'Kind' is missing in '{0}'")]
    MissingKind(String),

    #[error("no kind \"{kind}\" is registered for version \"{api_version}\" in scheme \"{scheme}\"")]
    NotRegistered {
        kind: String,
        api_version: String,
        scheme: &'static str,
    },

    #[error("{gvk}: {source}")]
    Body {
        gvk: GroupVersionKind,
        #[source]
        source: serde_json::Error,
    },
}

/// The embedded object was decoded fine, but it's not something the
/// webhook knows how to handle.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("unexpected type {0}")]
    UnexpectedType(String),
}

/// Failures that end up inside of the admission response, rather than
/// being reported at the HTTP level.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("cannot encode patch: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid content-type, expected application/json")]
    InvalidContentType,

    #[error("unexpected nil AdmissionRequest")]
    MissingRequest,
}

/// Failures that reject the whole request before the policy is evaluated.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("could not decode AdmissionReview")]
    Decode(#[source] DecodeError),

    #[error("unexpected GroupVersionKind: {0}")]
    UnexpectedGroupVersionKind(GroupVersionKind),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ReviewError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReviewError::Validation(ValidationError::InvalidContentType) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ReviewError::Validation(ValidationError::MissingRequest)
            | ReviewError::Decode(_)
            | ReviewError::UnexpectedGroupVersionKind(_) => StatusCode::BAD_REQUEST,
        }
    }
}
