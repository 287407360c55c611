//! Content-hash versions for stored resources.
//!
//! Versions are computed deterministically from resource content with
//! SHA-256 and surface as weak HTTP ETags, enabling optimistic concurrency
//! control in the transport layer without any provider-side bookkeeping.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// An opaque resource version derived from content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceVersion(String);

impl ResourceVersion {
    /// Compute the version of a serialized resource.
    pub fn from_content(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        // 16 hash bytes are plenty for change detection.
        Self(BASE64.encode(&digest[..16]))
    }

    /// Compute the version of a resource document.
    pub fn of_resource(resource: &Value) -> Self {
        Self::from_content(resource.to_string().as_bytes())
    }

    /// The opaque version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render as a weak HTTP ETag header value.
    pub fn to_etag(&self) -> String {
        format!("W/\"{}\"", self.0)
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn version_is_deterministic_over_content() {
        let a = ResourceVersion::of_resource(&json!({"userName": "x"}));
        let b = ResourceVersion::of_resource(&json!({"userName": "x"}));
        let c = ResourceVersion::of_resource(&json!({"userName": "y"}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn etag_is_weak_and_quoted() {
        let version = ResourceVersion::from_content(b"data");
        let etag = version.to_etag();
        assert!(etag.starts_with("W/\""));
        assert!(etag.ends_with('"'));
    }
}
