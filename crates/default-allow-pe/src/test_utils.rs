use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, SecurityContext};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;

pub(crate) fn container_no_security_context() -> Container {
    Container {
        name: "foo".to_owned(),
        image: Some("image:tag".to_owned()),
        ..Default::default()
    }
}

pub(crate) fn container_security_context_empty() -> Container {
    Container {
        security_context: Some(SecurityContext::default()),
        ..container_no_security_context()
    }
}

pub(crate) fn container_security_context_with_other_field() -> Container {
    Container {
        security_context: Some(SecurityContext {
            privileged: Some(true),
            ..Default::default()
        }),
        ..container_no_security_context()
    }
}

pub(crate) fn container_security_context_with_field() -> Container {
    Container {
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(true),
            ..Default::default()
        }),
        ..container_no_security_context()
    }
}

pub(crate) fn build_pod(
    namespace: Option<&str>,
    init_containers: Vec<Container>,
    containers: Vec<Container>,
) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some("some-pod".to_owned()),
            namespace: namespace.map(str::to_owned),
            ..Default::default()
        },
        spec: Some(PodSpec {
            init_containers: Some(init_containers),
            containers,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Wrap the given object inside of an AdmissionReview payload
pub(crate) fn build_admission_review(object: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "e911857d-c318-11e8-bbad-025000000001",
            "kind": {"group": "", "version": "v1", "kind": "Pod"},
            "resource": {"group": "", "version": "v1", "resource": "pods"},
            "operation": "CREATE",
            "userInfo": {"username": "admin"},
            "object": object,
        }
    }))
    .expect("serialization should work")
}
