use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Add,
}

/// A single RFC 6902 operation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PatchOperation {
    pub op: Op,
    /// JSON Pointer to the target location
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        PatchOperation {
            op: Op::Add,
            path: path.into(),
            value: Some(value),
        }
    }
}

/// Serialize the operations into a JSON Patch document.
///
/// Operations are written in the given order: an operation may target a
/// location created by one of the operations preceding it.
/// Returns `None` when there's nothing to patch.
pub fn encode(operations: &[PatchOperation]) -> serde_json::Result<Option<Vec<u8>>> {
    if operations.is_empty() {
        return Ok(None);
    }
    serde_json::to_vec(operations).map(Some)
}
