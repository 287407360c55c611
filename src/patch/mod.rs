//! RFC 7644 PATCH operation processing.
//!
//! This module implements the patch engine: parsing the PatchOp message,
//! resolving target paths against the schema registry, coercing values to
//! the target attribute type, and applying add/replace/remove with the
//! semantics of RFC 7644 Section 3.5.2.
//!
//! # Key Types
//!
//! - [`PatchEngine`] - Applies a [`PatchRequest`] to a resource document
//! - [`PatchRequest`] / [`PatchOperation`] - The PatchOp wire message
//! - [`PatchOutcome`] - The patched resource plus the effective-change flag
//!
//! # Examples
//!
//! ```rust
//! use scim_patch::patch::{PatchEngine, PatchOperation, PatchRequest};
//! use scim_patch::schema::SchemaRegistry;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::new()?;
//! let engine = PatchEngine::new(&registry, "User");
//!
//! let resource = json!({
//!     "userName": "bjensen",
//!     "emails": [{"type": "work", "value": "old@example.com"}]
//! });
//! let request = PatchRequest::new(vec![PatchOperation::replace(
//!     "emails[type eq \"work\"].value",
//!     json!("new@example.com"),
//! )]);
//!
//! let outcome = engine.apply(&resource, &request)?;
//! assert!(outcome.changed);
//! assert_eq!(outcome.resource["emails"][0]["value"], json!("new@example.com"));
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod request;
pub mod resolver;
pub mod value;


// Re-export the main types for convenience
pub use engine::{PatchEngine, PatchOutcome};
pub use request::{PatchOpKind, PatchOperation, PatchRequest, SCHEMA_PATCH_OP};
pub use resolver::{resolve_path, ResolvedPath};
pub use value::coerce_value;
