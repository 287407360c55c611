//! Wire types for the RFC 7644 PatchOp message.
//!
//! ```json
//! {
//!   "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
//!   "Operations": [
//!     { "op": "replace", "path": "userName", "value": "new" },
//!     { "op": "remove", "path": "phoneNumbers[type eq \"fax\"]" }
//!   ]
//! }
//! ```
//!
//! `value` stays an opaque JSON node until the engine has resolved the
//! target attribute, because its expected shape depends on the target type.

use crate::error::{ScimError, ScimResult};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Schema URI of the SCIM PatchOp message.
pub const SCHEMA_PATCH_OP: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// A SCIM PATCH request containing one or more operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRequest {
    /// SCIM schema URIs (must contain the PatchOp schema)
    pub schemas: Vec<String>,
    /// Operations, applied in list order
    #[serde(rename = "Operations")]
    pub operations: Vec<PatchOperation>,
}

impl PatchRequest {
    /// Create a patch request carrying the PatchOp schema URI.
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self {
            schemas: vec![SCHEMA_PATCH_OP.to_string()],
            operations,
        }
    }

    /// Validate the request envelope.
    pub fn validate(&self) -> ScimResult<()> {
        if !self.schemas.iter().any(|s| s == SCHEMA_PATCH_OP) {
            return Err(ScimError::invalid_syntax(format!(
                "request must declare the '{}' schema",
                SCHEMA_PATCH_OP
            )));
        }
        if self.operations.is_empty() {
            return Err(ScimError::invalid_value(
                "Operations must contain at least one patch operation",
            ));
        }
        Ok(())
    }
}

/// A single PATCH operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchOperation {
    /// The operation kind (`add`, `replace`, `remove`)
    pub op: PatchOpKind,
    /// Target path; optional for add/replace, required for remove
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Operation value; scalar, object, or array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: Some(path.into()),
            value: Some(value),
        }
    }

    /// An add operation without a path, merging `value` into the root.
    pub fn add_root(value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: None,
            value: Some(value),
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Replace,
            path: Some(path.into()),
            value: Some(value),
        }
    }

    /// A replace operation without a path, overwriting root-level attributes.
    pub fn replace_root(value: Value) -> Self {
        Self {
            op: PatchOpKind::Replace,
            path: None,
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOpKind::Remove,
            path: Some(path.into()),
            value: None,
        }
    }

    /// The operation's values as a list.
    ///
    /// A JSON array value contributes its elements; any other value
    /// contributes itself; an absent value contributes nothing.
    pub(crate) fn values(&self) -> Vec<Value> {
        match &self.value {
            None => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }
}

/// PATCH operation kinds per RFC 7644 Section 3.5.2.
///
/// Deserialization is case-insensitive (`"Add"`, `"ADD"` and `"add"` are
/// all accepted); serialization always emits lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOpKind {
    Add,
    Replace,
    Remove,
}

impl PatchOpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOpKind::Add => "add",
            PatchOpKind::Replace => "replace",
            PatchOpKind::Remove => "remove",
        }
    }
}

impl std::fmt::Display for PatchOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PatchOpKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PatchOpKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_lowercase().as_str() {
            "add" => Ok(PatchOpKind::Add),
            "replace" => Ok(PatchOpKind::Replace),
            "remove" => Ok(PatchOpKind::Remove),
            _ => Err(serde::de::Error::unknown_variant(
                &raw,
                &["add", "replace", "remove"],
            )),
        }
    }
}
