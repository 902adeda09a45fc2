use std::{collections::HashMap, fmt};

use k8s_openapi::{
    api::core::v1::{Pod, Secret},
    Resource,
};
use serde::{Deserialize, Serialize};

use crate::{admission_review::AdmissionReview, errors::DecodeError};

pub const ADMISSION_GROUP: &str = "admission.k8s.io";
pub const ADMISSION_VERSION: &str = "v1";
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// Reported by decode errors
pub const SCHEME_NAME: &str = "default-allow-pe";

/// core/v1 kinds the webhook can receive but has no typed model for.
const UNTYPED_CORE_KINDS: [&str; 15] = [
    "Binding",
    "ComponentStatus",
    "ConfigMap",
    "Endpoints",
    "Event",
    "LimitRange",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "PodTemplate",
    "ReplicationController",
    "ResourceQuota",
    "Service",
    "ServiceAccount",
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        GroupVersionKind {
            group: group.to_owned(),
            version: version.to_owned(),
            kind: kind.to_owned(),
        }
    }

    pub fn admission_review() -> Self {
        Self::new(ADMISSION_GROUP, ADMISSION_VERSION, ADMISSION_REVIEW_KIND)
    }

    /// Build a GVK out of the `apiVersion` and `kind` fields of an object.
    /// An `apiVersion` without a `/` belongs to the core group.
    pub fn from_type_meta(api_version: &str, kind: &str) -> Self {
        let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
        Self::new(group, version, kind)
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// The name used when reporting a decoded object of the wrong type,
    /// e.g. `*v1.Secret`.
    pub fn type_name(&self) -> String {
        format!("*{}.{}", self.version, self.kind)
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
    }
}

/// The closed set of objects the scheme can produce.
#[derive(Debug)]
pub enum Object {
    AdmissionReview(Box<AdmissionReview>),
    Pod(Box<Pod>),
    Secret(Box<Secret>),
    /// A registered kind without a typed model
    Other(serde_json::Value),
}

#[derive(Debug)]
pub struct Decoded {
    pub gvk: GroupVersionKind,
    pub object: Object,
}

impl Decoded {
    pub fn type_name(&self) -> String {
        self.gvk.type_name()
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TypeMeta {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
}

type DecodeFn = fn(&[u8]) -> serde_json::Result<Object>;

/// Registry of the kinds that can be decoded, keyed by their GVK.
///
/// The registry is populated once by [`Scheme::new`] and cannot be changed
/// afterwards, which makes it safe to share between concurrent requests.
pub struct Scheme {
    types: HashMap<GroupVersionKind, DecodeFn>,
}

impl Default for Scheme {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheme {
    pub fn new() -> Self {
        let mut types: HashMap<GroupVersionKind, DecodeFn> = HashMap::new();

        types.insert(GroupVersionKind::admission_review(), decode_admission_review);
        types.insert(
            GroupVersionKind::new(Pod::GROUP, Pod::VERSION, Pod::KIND),
            decode_pod,
        );
        types.insert(
            GroupVersionKind::new(Secret::GROUP, Secret::VERSION, Secret::KIND),
            decode_secret,
        );
        for kind in UNTYPED_CORE_KINDS {
            types.insert(GroupVersionKind::new("", "v1", kind), decode_untyped);
        }

        Scheme { types }
    }

    pub fn is_registered(&self, gvk: &GroupVersionKind) -> bool {
        self.types.contains_key(gvk)
    }

    /// Decode `data` into one of the registered kinds.
    ///
    /// The type is resolved by looking at the `apiVersion` and `kind` fields
    /// of the payload. When `defaults` is provided, it fills the parts of the
    /// GVK that are missing from the payload.
    pub fn decode(
        &self,
        data: &[u8],
        defaults: Option<&GroupVersionKind>,
    ) -> Result<Decoded, DecodeError> {
        let type_meta: TypeMeta = serde_json::from_slice(data).map_err(DecodeError::TypeMeta)?;
        let mut gvk = GroupVersionKind::from_type_meta(&type_meta.api_version, &type_meta.kind);

        if let Some(defaults) = defaults {
            if gvk.kind.is_empty() {
                gvk.kind = defaults.kind.clone();
            }
            if gvk.version.is_empty() && (gvk.group.is_empty() || gvk.group == defaults.group) {
                gvk.group = defaults.group.clone();
                gvk.version = defaults.version.clone();
            }
        }

        if gvk.kind.is_empty() {
            return Err(DecodeError::MissingKind(
                String::from_utf8_lossy(data).into_owned(),
            ));
        }

        let decode = self
            .types
            .get(&gvk)
            .ok_or_else(|| DecodeError::NotRegistered {
                kind: gvk.kind.clone(),
                api_version: gvk.api_version(),
                scheme: SCHEME_NAME,
            })?;

        match decode(data) {
            Ok(object) => Ok(Decoded { gvk, object }),
            Err(source) => Err(DecodeError::Body { gvk, source }),
        }
    }
}

fn decode_admission_review(data: &[u8]) -> serde_json::Result<Object> {
    let review: AdmissionReview = serde_json::from_slice(data)?;
    Ok(Object::AdmissionReview(Box::new(review)))
}

fn decode_pod(data: &[u8]) -> serde_json::Result<Object> {
    let pod: Pod = serde_json::from_slice(data)?;
    Ok(Object::Pod(Box::new(pod)))
}

fn decode_secret(data: &[u8]) -> serde_json::Result<Object> {
    let secret: Secret = serde_json::from_slice(data)?;
    Ok(Object::Secret(Box::new(secret)))
}

fn decode_untyped(data: &[u8]) -> serde_json::Result<Object> {
    serde_json::from_slice(data).map(Object::Other)
}
