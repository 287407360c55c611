//! Error types for SCIM patch and filter processing.
//!
//! Every failure the engine can produce carries the machine-readable
//! `scimType` code defined by RFC 7644 Section 3.12, so the hosting
//! transport layer can render a compliant error response without inspecting
//! message text.

use serde::{Deserialize, Serialize};

/// SCIM error type codes per RFC 7644 Section 3.12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimType {
    /// The "path" attribute was invalid or malformed
    InvalidPath,
    /// A required value was missing, or the value was not compatible with
    /// the attribute type
    InvalidValue,
    /// The filter syntax was invalid or the filter is not type-compatible
    /// with the target attribute
    InvalidFilter,
    /// The specified "path" did not yield an attribute or value that could
    /// be operated on
    NoTarget,
    /// The attempted modification is not compatible with the target
    /// attribute's mutability
    Mutability,
    /// One or more attribute values are already in use or reserved
    Uniqueness,
    /// The request body structure was invalid or did not conform to the
    /// request schema
    InvalidSyntax,
}

impl ScimType {
    /// The wire representation of the code (e.g. `"invalidPath"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ScimType::InvalidPath => "invalidPath",
            ScimType::InvalidValue => "invalidValue",
            ScimType::InvalidFilter => "invalidFilter",
            ScimType::NoTarget => "noTarget",
            ScimType::Mutability => "mutability",
            ScimType::Uniqueness => "uniqueness",
            ScimType::InvalidSyntax => "invalidSyntax",
        }
    }
}

impl std::fmt::Display for ScimType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for patch and filter operations.
///
/// Each variant maps onto exactly one [`ScimType`] code via
/// [`ScimError::scim_type`]. Parser errors additionally carry the byte
/// position of the offending token where available.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScimError {
    /// The patch path was syntactically or semantically invalid
    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// The filter expression was malformed or type-incompatible
    #[error("invalid filter: {message}")]
    InvalidFilter {
        message: String,
        /// Byte offset of the offending token, when known
        position: Option<usize>,
    },

    /// A value did not conform to the target attribute's type
    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    /// The path resolved to no attribute or value to operate on
    #[error("no target found for path '{path}'")]
    NoTarget { path: String },

    /// The attribute name could not be resolved against any registered schema
    #[error("unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    /// The operation conflicts with the attribute's mutability or required
    /// characteristics
    #[error("mutability violation on attribute '{attribute}': {message}")]
    Mutability { attribute: String, message: String },

    /// The request envelope was structurally invalid
    #[error("invalid syntax: {message}")]
    InvalidSyntax { message: String },
}

impl ScimError {
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_filter(message: impl Into<String>, position: Option<usize>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
            position,
        }
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    pub fn no_target(path: impl Into<String>) -> Self {
        Self::NoTarget { path: path.into() }
    }

    pub fn unknown_attribute(name: impl Into<String>) -> Self {
        Self::UnknownAttribute { name: name.into() }
    }

    pub fn mutability(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mutability {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn invalid_syntax(message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            message: message.into(),
        }
    }

    /// The RFC 7644 `scimType` code for this error.
    pub fn scim_type(&self) -> ScimType {
        match self {
            ScimError::InvalidPath { .. } => ScimType::InvalidPath,
            ScimError::InvalidFilter { .. } => ScimType::InvalidFilter,
            ScimError::InvalidValue { .. } => ScimType::InvalidValue,
            ScimError::NoTarget { .. } => ScimType::NoTarget,
            // Attribute lookup failures surface as path errors on the wire;
            // the distinct variant is kept for hosts that want to tell them
            // apart.
            ScimError::UnknownAttribute { .. } => ScimType::InvalidPath,
            ScimError::Mutability { .. } => ScimType::Mutability,
            ScimError::InvalidSyntax { .. } => ScimType::InvalidSyntax,
        }
    }

    /// The HTTP status the envelope layer should respond with.
    ///
    /// All modelled patch failures are client errors; the envelope layer may
    /// remap (e.g. `noTarget` onto 404 for some deployments) per its own
    /// rules.
    pub fn http_status(&self) -> u16 {
        400
    }

    /// Render this error as an RFC 7644 Section 3.12 error response body.
    pub fn to_response(&self) -> ScimErrorResponse {
        ScimErrorResponse {
            schemas: vec![SCHEMA_ERROR.to_string()],
            status: self.http_status().to_string(),
            scim_type: Some(self.scim_type()),
            detail: self.to_string(),
        }
    }
}

/// Schema URI of the SCIM error response message.
pub const SCHEMA_ERROR: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

/// SCIM error response body per RFC 7644 Section 3.12.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorResponse {
    /// Always contains the Error message schema URI
    pub schemas: Vec<String>,
    /// HTTP status code as a string (e.g. "400")
    pub status: String,
    /// Machine-readable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<ScimType>,
    /// Human-readable detail
    pub detail: String,
}

/// Result type alias for patch and filter operations.
pub type ScimResult<T> = Result<T, ScimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scim_type_codes_match_rfc_spelling() {
        assert_eq!(ScimType::InvalidPath.as_str(), "invalidPath");
        assert_eq!(ScimType::NoTarget.as_str(), "noTarget");
        assert_eq!(ScimType::InvalidSyntax.as_str(), "invalidSyntax");
    }

    #[test]
    fn classification_covers_every_variant() {
        let err = ScimError::invalid_path("emails[", "unterminated filter");
        assert_eq!(err.scim_type(), ScimType::InvalidPath);
        assert_eq!(err.http_status(), 400);

        let err = ScimError::unknown_attribute("badAttr");
        assert_eq!(err.scim_type(), ScimType::InvalidPath);

        let err = ScimError::mutability("id", "attribute is readOnly");
        assert_eq!(err.scim_type(), ScimType::Mutability);
    }

    #[test]
    fn error_response_serializes_scim_type_camel_case() {
        let body = ScimError::invalid_filter("unexpected token", Some(7)).to_response();
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"scimType\":\"invalidFilter\""));
        assert!(json.contains("\"status\":\"400\""));
        assert!(json.contains(SCHEMA_ERROR));
    }
}
