use tracing::{debug, warn};

use crate::{
    admission_review::{AdmissionRequest, AdmissionResponse, AdmissionReview},
    errors::{MutationError, ReviewError, ValidationError},
    patch::{self, PatchOperation},
    policy,
    scheme::{GroupVersionKind, Object, Scheme},
};

/// Process a raw AdmissionReview payload.
///
/// The returned review is the one received, with its `response` populated.
/// Problems with the embedded object end up inside of the response, only
/// a malformed envelope produces an error.
pub fn review(
    scheme: &Scheme,
    body: &[u8],
    default_allow: bool,
) -> Result<AdmissionReview, ReviewError> {
    let envelope_gvk = GroupVersionKind::admission_review();
    let decoded = scheme
        .decode(body, Some(&envelope_gvk))
        .map_err(ReviewError::Decode)?;

    let mut admission_review = match decoded.object {
        Object::AdmissionReview(admission_review) => *admission_review,
        Object::Pod(_) | Object::Secret(_) | Object::Other(_) => {
            return Err(ReviewError::UnexpectedGroupVersionKind(decoded.gvk));
        }
    };

    let request = admission_review
        .request
        .as_ref()
        .ok_or(ValidationError::MissingRequest)?;
    let response = mutate(scheme, request, default_allow);

    admission_review.api_version = Some(decoded.gvk.api_version());
    admission_review.kind = Some(decoded.gvk.kind);
    admission_review.response = Some(response);

    Ok(admission_review)
}

/// Decode the object carried by the request and compute its response
pub fn mutate(scheme: &Scheme, request: &AdmissionRequest, default_allow: bool) -> AdmissionResponse {
    let outcome = scheme
        .decode(request.object_bytes(), None)
        .map_err(MutationError::from)
        .and_then(|decoded| {
            policy::evaluate(&decoded, default_allow)
                .map_err(MutationError::from)
        });

    build_response(&request.uid, outcome)
}

/// Turn the outcome of the policy into an admission response. The `uid` is
/// always copied over, regardless of the outcome.
pub fn build_response(
    uid: &str,
    outcome: Result<Vec<PatchOperation>, MutationError>,
) -> AdmissionResponse {
    let encoded = outcome.and_then(|operations| {
        debug!(operations = operations.len(), "policy evaluated");
        patch::encode(&operations).map_err(MutationError::Encode)
    });

    match encoded {
        Ok(None) => AdmissionResponse::allow(uid.to_owned()),
        Ok(Some(patch)) => AdmissionResponse::allow_with_patch(uid.to_owned(), &patch),
        Err(error) => {
            warn!(error = %error, "cannot mutate object");
            AdmissionResponse::failure(uid.to_owned(), error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission_review::{PatchType, StatusValue};
    use crate::errors::{DecodeError, PolicyError};
    use crate::test_utils::{
        build_admission_review, build_pod, container_no_security_context,
        container_security_context_empty, container_security_context_with_field,
        container_security_context_with_other_field,
    };
    use k8s_openapi::api::core::v1::{Container, Pod, Secret};
    use rstest::*;
    use serde_json::json;

    const UID: &str = "e911857d-c318-11e8-bbad-025000000001";

    fn review_pod(pod: &Pod, default_allow: bool) -> AdmissionResponse {
        let body = build_admission_review(serde_json::to_value(pod).unwrap());
        review(&Scheme::new(), &body, default_allow)
            .expect("review should work")
            .response
            .expect("response should be set")
    }

    fn decoded_patch(response: &AdmissionResponse) -> serde_json::Value {
        let patch = response
            .decoded_patch()
            .expect("patch should be valid base64")
            .expect("patch should be set");
        serde_json::from_slice(&patch).expect("patch should be valid JSON")
    }

    #[rstest]
    #[case::namespace_system(build_pod(Some("kube-system"), vec![], vec![container_no_security_context()]))]
    #[case::namespace_public(build_pod(Some("kube-public"), vec![], vec![container_no_security_context()]))]
    #[case::container_security_context_with_field(build_pod(Some("default"), vec![], vec![container_security_context_with_field()]))]
    #[case::no_containers(build_pod(Some("default"), vec![], vec![]))]
    fn no_patches(#[case] pod: Pod) {
        let response = review_pod(&pod, false);

        assert!(response.allowed);
        assert_eq!(UID, response.uid);
        assert!(response.patch.is_none());
        assert!(response.patch_type.is_none());
        assert!(response.result.is_none());
    }

    #[rstest]
    #[case::container_no_security_context(
        vec![],
        vec![container_no_security_context()],
        json!([
            {"op": "add", "path": "/spec/containers/0/securityContext", "value": {}},
            {"op": "add", "path": "/spec/containers/0/securityContext/allowPrivilegeEscalation", "value": false},
        ]),
    )]
    #[case::container_empty_security_context(
        vec![],
        vec![container_security_context_empty()],
        json!([
            {"op": "add", "path": "/spec/containers/0/securityContext/allowPrivilegeEscalation", "value": false},
        ]),
    )]
    #[case::container_security_context_with_other_field(
        vec![],
        vec![container_security_context_with_other_field()],
        json!([
            {"op": "add", "path": "/spec/containers/0/securityContext/allowPrivilegeEscalation", "value": false},
        ]),
    )]
    #[case::initcontainer_no_security_context(
        vec![container_no_security_context()],
        vec![],
        json!([
            {"op": "add", "path": "/spec/initContainers/0/securityContext", "value": {}},
            {"op": "add", "path": "/spec/initContainers/0/securityContext/allowPrivilegeEscalation", "value": false},
        ]),
    )]
    #[case::initcontainer_empty_security_context(
        vec![container_security_context_empty()],
        vec![],
        json!([
            {"op": "add", "path": "/spec/initContainers/0/securityContext/allowPrivilegeEscalation", "value": false},
        ]),
    )]
    #[case::initcontainer_and_container(
        vec![container_no_security_context()],
        vec![container_no_security_context()],
        json!([
            {"op": "add", "path": "/spec/initContainers/0/securityContext", "value": {}},
            {"op": "add", "path": "/spec/initContainers/0/securityContext/allowPrivilegeEscalation", "value": false},
            {"op": "add", "path": "/spec/containers/0/securityContext", "value": {}},
            {"op": "add", "path": "/spec/containers/0/securityContext/allowPrivilegeEscalation", "value": false},
        ]),
    )]
    fn patches(
        #[case] init_containers: Vec<Container>,
        #[case] containers: Vec<Container>,
        #[case] expected: serde_json::Value,
    ) {
        let pod = build_pod(Some("default"), init_containers, containers);

        let response = review_pod(&pod, false);

        assert!(response.allowed);
        assert_eq!(UID, response.uid);
        assert_eq!(Some(PatchType::JSONPatch), response.patch_type);
        assert_eq!(expected, decoded_patch(&response));
    }

    #[test]
    fn configured_default_is_used() {
        let pod = build_pod(Some("default"), vec![], vec![container_security_context_empty()]);

        let response = review_pod(&pod, true);

        assert_eq!(
            json!([{"op": "add", "path": "/spec/containers/0/securityContext/allowPrivilegeEscalation", "value": true}]),
            decoded_patch(&response)
        );
    }

    #[test]
    fn request_namespace_does_not_exclude_pod() {
        let pod = build_pod(None, vec![], vec![container_no_security_context()]);
        let body = serde_json::to_vec(&json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": UID,
                "kind": {"group": "", "version": "v1", "kind": "Pod"},
                "namespace": "kube-system",
                "operation": "CREATE",
                "object": serde_json::to_value(&pod).unwrap(),
            }
        }))
        .unwrap();

        let response = review(&Scheme::new(), &body, false)
            .expect("review should work")
            .response
            .expect("response should be set");

        assert!(response.allowed);
        assert_eq!(
            json!([
                {"op": "add", "path": "/spec/containers/0/securityContext", "value": {}},
                {"op": "add", "path": "/spec/containers/0/securityContext/allowPrivilegeEscalation", "value": false},
            ]),
            decoded_patch(&response)
        );
    }

    #[test]
    fn secret_is_an_unexpected_type() {
        let secret = Secret {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("some-secret".to_owned()),
                ..Default::default()
            },
            ..Default::default()
        };
        let body = build_admission_review(serde_json::to_value(&secret).unwrap());

        let response = review(&Scheme::new(), &body, false)
            .expect("review should work")
            .response
            .expect("response should be set");

        assert!(!response.allowed);
        assert_eq!(UID, response.uid);
        let result = response.result.expect("result should be set");
        assert_eq!(Some(StatusValue::Failure), result.status);
        assert_eq!(Some("unexpected type *v1.Secret".to_owned()), result.message);
    }

    #[test]
    fn gibberish_object_is_reported_in_the_response() {
        let body = build_admission_review(json!("foobar"));

        let response = review(&Scheme::new(), &body, false)
            .expect("review should work")
            .response
            .expect("response should be set");

        assert!(!response.allowed);
        let message = response
            .result
            .and_then(|result| result.message)
            .expect("message should be set");
        assert!(message.starts_with("couldn't get version/kind; json parse error:"));
    }

    #[test]
    fn envelope_type_meta_is_filled_in() {
        let pod = build_pod(Some("default"), vec![], vec![]);
        let body = serde_json::to_vec(&json!({
            "request": {
                "uid": UID,
                "kind": {"kind": "Pod"},
                "operation": "CREATE",
                "object": serde_json::to_value(&pod).unwrap(),
            }
        }))
        .unwrap();

        let admission_review = review(&Scheme::new(), &body, false).expect("review should work");

        assert_eq!(Some("admission.k8s.io/v1".to_owned()), admission_review.api_version);
        assert_eq!(Some("AdmissionReview".to_owned()), admission_review.kind);
        assert_eq!(UID, admission_review.request.unwrap().uid);
    }

    #[test]
    fn invalid_envelope() {
        let error = review(&Scheme::new(), b"foobar", false).expect_err("review should fail");

        assert!(matches!(error, ReviewError::Decode(DecodeError::TypeMeta(_))));
        assert_eq!("could not decode AdmissionReview", error.to_string());
    }

    #[test]
    fn unexpected_envelope_kind() {
        let error = review(
            &Scheme::new(),
            br#"{"apiVersion":"v1","kind":"Secret","metadata":{"name":"some-secret"}}"#,
            false,
        )
        .expect_err("review should fail");

        assert_eq!(
            "unexpected GroupVersionKind: /v1, Kind=Secret",
            error.to_string()
        );
    }

    #[test]
    fn missing_request() {
        let error = review(
            &Scheme::new(),
            br#"{"apiVersion":"admission.k8s.io/v1","kind":"AdmissionReview"}"#,
            false,
        )
        .expect_err("review should fail");

        assert!(matches!(
            error,
            ReviewError::Validation(ValidationError::MissingRequest)
        ));
        assert_eq!("unexpected nil AdmissionRequest", error.to_string());
    }

    #[test]
    fn build_response_copies_uid() {
        let allowed = build_response("a", Ok(vec![]));
        let failed = build_response(
            "b",
            Err(PolicyError::UnexpectedType("*v1.ConfigMap".to_owned()).into()),
        );

        assert_eq!("a", allowed.uid);
        assert!(allowed.allowed);
        assert_eq!("b", failed.uid);
        assert!(!failed.allowed);
    }
}
