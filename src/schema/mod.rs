//! Schema definitions and attribute resolution for SCIM resources.
//!
//! This module provides the schema registry implementing RFC 7643 core
//! schemas together with the attribute-resolution queries the filter and
//! patch layers build on.
//!
//! # Key Types
//!
//! - [`Schema`] - SCIM schema definition with attributes and metadata
//! - [`SchemaRegistry`] - Registry mapping attribute names to definitions
//! - [`AttributeDefinition`] - Individual attribute specifications and constraints
//!
//! # Examples
//!
//! ```rust
//! use scim_patch::schema::SchemaRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::new()?;
//! let attr = registry.resolve_attribute("User", "name.givenName")?;
//! assert_eq!(attr.target().name, "givenName");
//! # Ok(())
//! # }
//! ```

pub mod embedded;
pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export the main types for convenience
pub use registry::{AttributeRef, SchemaRegistry};
pub use types::{
    AttributeDefinition, AttributeType, Mutability, ResourceType, Schema, SchemaExtension,
    Uniqueness,
};
