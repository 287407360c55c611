//! SCIM 2.0 patch engine and filter/path parser for Rust.
//!
//! Implements the RFC 7644 Section 3.5.2 PATCH semantics over schema-typed
//! resource documents, together with the RFC 7644 Section 3.4.2 filter
//! mini-language that patch paths embed
//! (`emails[type eq "work"].value`).
//!
//! # Core Components
//!
//! - [`PatchEngine`] - Applies add/replace/remove operations to a resource
//! - [`SchemaRegistry`] - Resolves attribute names against RFC 7643 schemas
//! - [`filter`] - Filter/path parsing and evaluation
//! - [`provider`] - Async storage contract and load-patch-store glue
//!
//! # Quick Start
//!
//! ```rust
//! use scim_patch::{PatchEngine, PatchOperation, PatchRequest, SchemaRegistry};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::new()?;
//! let engine = PatchEngine::new(&registry, "User");
//!
//! let resource = json!({"userName": "bjensen"});
//! let request = PatchRequest::new(vec![PatchOperation::replace(
//!     "userName",
//!     json!("bjensen@example.com"),
//! )]);
//! let outcome = engine.apply(&resource, &request)?;
//! assert!(outcome.changed);
//! # Ok(())
//! # }
//! ```
//!
//! The engine is synchronous, mutates a defensive copy of the caller-owned
//! document, and reports failures as [`ScimError`]s carrying the RFC 7644
//! `scimType` code. It owns no transport, persistence, or logging.

pub mod error;
pub mod filter;
pub mod patch;
pub mod provider;
pub mod schema;

// Re-export commonly used types for convenience
pub use error::{ScimError, ScimErrorResponse, ScimResult, ScimType};
pub use filter::{evaluate_filter, parse_filter, parse_path, FilterExpr, PathExpr};
pub use patch::{PatchEngine, PatchOpKind, PatchOperation, PatchOutcome, PatchRequest};
pub use provider::{InMemoryStore, ResourceStore, ResourceVersion, VersionedResource};
pub use schema::{AttributeDefinition, AttributeType, Mutability, Schema, SchemaRegistry};
