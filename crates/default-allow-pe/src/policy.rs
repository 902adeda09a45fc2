use k8s_openapi::api::core::v1::{Container, Pod, SecurityContext};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    errors::PolicyError,
    patch::PatchOperation,
    scheme::{Decoded, Object},
};

/// Namespaces whose workloads are never mutated: they are managed by the
/// cluster itself, not by the operator.
pub const IGNORED_NAMESPACES: [&str; 2] = ["kube-system", "kube-public"];

const ALLOW_PRIVILEGE_ESCALATION: &str = "allowPrivilegeEscalation";

pub fn mutation_required(namespace: &str) -> bool {
    !IGNORED_NAMESPACES.contains(&namespace)
}

/// Compute the operations needed to set `allowPrivilegeEscalation` on a
/// single container. `base_path` points to the `securityContext` of the
/// container.
///
/// Only an unset value is defaulted, an explicit `false` is left alone.
pub fn evaluate_container(
    security_context: Option<&SecurityContext>,
    base_path: &str,
    default_allow: bool,
) -> Vec<PatchOperation> {
    let field_path = format!("{base_path}/{ALLOW_PRIVILEGE_ESCALATION}");

    match security_context {
        // the securityContext must exist before its field can be added
        None => vec![
            PatchOperation::add(base_path, json!({})),
            PatchOperation::add(field_path, Value::Bool(default_allow)),
        ],
        Some(sc) if sc.allow_privilege_escalation.is_none() => {
            vec![PatchOperation::add(field_path, Value::Bool(default_allow))]
        }
        Some(_) => Vec::new(),
    }
}

/// Compute the operations for all the containers of the Pod, init containers
/// first.
///
/// Only the `metadata.namespace` of the Pod decides whether the mutation
/// applies. A Pod without one is always mutated.
pub fn evaluate_pod(pod: &Pod, default_allow: bool) -> Vec<PatchOperation> {
    let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();

    if !mutation_required(namespace) {
        debug!(namespace, "namespace is ignored, skipping mutation");
        return Vec::new();
    }

    let Some(spec) = pod.spec.as_ref() else {
        return Vec::new();
    };

    let init_containers = spec.init_containers.as_deref().unwrap_or_default();
    let mut operations = containers_operations(init_containers, "initContainers", default_allow);
    operations.extend(containers_operations(
        &spec.containers,
        "containers",
        default_allow,
    ));

    operations
}

fn containers_operations(
    containers: &[Container],
    field: &str,
    default_allow: bool,
) -> Vec<PatchOperation> {
    containers
        .iter()
        .enumerate()
        .flat_map(|(index, container)| {
            evaluate_container(
                container.security_context.as_ref(),
                &format!("/spec/{field}/{index}/securityContext"),
                default_allow,
            )
        })
        .collect()
}

/// Entry point of the policy: only Pods can be mutated, any other object is
/// an error.
pub fn evaluate(decoded: &Decoded, default_allow: bool) -> Result<Vec<PatchOperation>, PolicyError> {
    match &decoded.object {
        Object::Pod(pod) => Ok(evaluate_pod(pod, default_allow)),
        Object::Secret(_) | Object::AdmissionReview(_) | Object::Other(_) => {
            Err(PolicyError::UnexpectedType(decoded.type_name()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::Scheme;
    use crate::test_utils::{
        build_pod, container_no_security_context, container_security_context_empty,
        container_security_context_with_field, container_security_context_with_other_field,
    };
    use rstest::*;

    fn paths(operations: &[PatchOperation]) -> Vec<&str> {
        operations.iter().map(|op| op.path.as_str()).collect()
    }

    #[rstest]
    #[case::system("kube-system", false)]
    #[case::public("kube-public", false)]
    #[case::default("default", true)]
    #[case::empty("", true)]
    #[case::lookalike("kube-system-2", true)]
    fn namespace_exclusion(#[case] namespace: &str, #[case] expected: bool) {
        assert_eq!(expected, mutation_required(namespace));
    }

    #[rstest]
    #[case::allowed(true)]
    #[case::denied(false)]
    fn container_without_security_context(#[case] default_allow: bool) {
        let operations = evaluate_container(None, "/spec/containers/0/securityContext", default_allow);

        assert_eq!(
            vec![
                PatchOperation::add("/spec/containers/0/securityContext", json!({})),
                PatchOperation::add(
                    "/spec/containers/0/securityContext/allowPrivilegeEscalation",
                    json!(default_allow)
                ),
            ],
            operations
        );
    }

    #[rstest]
    #[case::empty(container_security_context_empty())]
    #[case::other_field(container_security_context_with_other_field())]
    fn container_without_field(#[case] container: Container) {
        let operations = evaluate_container(
            container.security_context.as_ref(),
            "/spec/initContainers/3/securityContext",
            true,
        );

        assert_eq!(
            vec![PatchOperation::add(
                "/spec/initContainers/3/securityContext/allowPrivilegeEscalation",
                json!(true)
            )],
            operations
        );
    }

    #[rstest]
    #[case::set_to_true(Some(true))]
    #[case::set_to_false(Some(false))]
    fn container_with_field(#[case] value: Option<bool>) {
        let security_context = SecurityContext {
            allow_privilege_escalation: value,
            ..Default::default()
        };

        assert!(evaluate_container(
            Some(&security_context),
            "/spec/containers/0/securityContext",
            false
        )
        .is_empty());
    }

    #[rstest]
    #[case::kube_system("kube-system")]
    #[case::kube_public("kube-public")]
    fn ignored_namespaces_are_not_patched(#[case] namespace: &str) {
        let pod = build_pod(
            Some(namespace),
            vec![container_no_security_context()],
            vec![container_no_security_context()],
        );

        assert!(evaluate_pod(&pod, false).is_empty());
    }

    #[rstest]
    #[case::missing(None)]
    #[case::empty(Some(""))]
    fn pod_without_namespace_is_patched(#[case] namespace: Option<&str>) {
        let pod = build_pod(namespace, vec![], vec![container_no_security_context()]);

        assert_eq!(2, evaluate_pod(&pod, false).len());
    }

    #[test]
    fn init_containers_come_first() {
        let pod = build_pod(
            Some("default"),
            vec![container_no_security_context()],
            vec![container_no_security_context()],
        );

        let operations = evaluate_pod(&pod, false);

        assert_eq!(
            vec![
                "/spec/initContainers/0/securityContext",
                "/spec/initContainers/0/securityContext/allowPrivilegeEscalation",
                "/spec/containers/0/securityContext",
                "/spec/containers/0/securityContext/allowPrivilegeEscalation",
            ],
            paths(&operations)
        );
        assert!(operations[1..]
            .iter()
            .step_by(2)
            .all(|op| op.value == Some(json!(false))));
    }

    #[test]
    fn containers_are_patched_by_index() {
        let pod = build_pod(
            Some("default"),
            vec![],
            vec![
                container_security_context_with_field(),
                container_security_context_empty(),
                container_no_security_context(),
            ],
        );

        let operations = evaluate_pod(&pod, true);

        assert_eq!(
            vec![
                "/spec/containers/1/securityContext/allowPrivilegeEscalation",
                "/spec/containers/2/securityContext",
                "/spec/containers/2/securityContext/allowPrivilegeEscalation",
            ],
            paths(&operations)
        );
    }

    #[test]
    fn pod_without_spec() {
        let pod = Pod::default();

        assert!(evaluate_pod(&pod, false).is_empty());
    }

    #[test]
    fn non_pod_objects_are_rejected() {
        let scheme = Scheme::new();
        let decoded = scheme
            .decode(
                br#"{"apiVersion":"v1","kind":"Secret","metadata":{"name":"some-secret"}}"#,
                None,
            )
            .unwrap();

        let error = evaluate(&decoded, false).expect_err("a Secret cannot be mutated");

        assert_eq!("unexpected type *v1.Secret", error.to_string());
    }
}
