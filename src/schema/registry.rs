//! Schema registry for loading, managing, and resolving SCIM schemas.
//!
//! The registry is built once at startup and is read-only afterwards; the
//! patch engine shares it freely across requests. Besides holding schema
//! documents it answers the attribute-resolution queries the filter and
//! patch layers depend on: mapping a fully qualified name, a dotted short
//! form, or an extension URI onto an [`AttributeDefinition`].

use super::embedded;
use super::types::{AttributeDefinition, ResourceType, Schema, SchemaExtension};
use crate::error::{ScimError, ScimResult};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A resolved attribute reference.
///
/// Carries the schema URI the attribute belongs to, the top-level attribute
/// definition, and the sub-attribute definition when the lookup named one
/// (e.g. `name.givenName`).
#[derive(Debug, Clone, Copy)]
pub struct AttributeRef<'a> {
    /// URI of the schema (base or extension) that declares the attribute
    pub schema_uri: &'a str,
    /// The top-level attribute definition
    pub attribute: &'a AttributeDefinition,
    /// The resolved sub-attribute, when the name was dotted
    pub sub_attribute: Option<&'a AttributeDefinition>,
}

impl AttributeRef<'_> {
    /// The definition the operation ultimately targets: the sub-attribute
    /// when present, the top-level attribute otherwise.
    pub fn target(&self) -> &AttributeDefinition {
        self.sub_attribute.unwrap_or(self.attribute)
    }
}

/// Registry for SCIM schemas and resource types.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
    resource_types: HashMap<String, ResourceType>,
}

impl SchemaRegistry {
    /// Create a registry with the embedded core schemas.
    ///
    /// Registers the core User and Group schemas plus the enterprise User
    /// extension, and the matching "User" and "Group" resource types.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_embedded_schemas()
    }

    /// Create a registry with the embedded core schemas.
    pub fn with_embedded_schemas() -> Result<Self, Box<dyn std::error::Error>> {
        let user: Schema = serde_json::from_str(embedded::core_user_schema())?;
        let group: Schema = serde_json::from_str(embedded::core_group_schema())?;
        let enterprise: Schema = serde_json::from_str(embedded::enterprise_user_schema())?;

        let mut registry = Self {
            schemas: HashMap::new(),
            resource_types: HashMap::new(),
        };

        let user_id = user.id.clone();
        let group_id = group.id.clone();
        let enterprise_id = enterprise.id.clone();
        registry.add_schema(user);
        registry.add_schema(group);
        registry.add_schema(enterprise);

        registry.register_resource_type(ResourceType {
            name: "User".to_string(),
            schema: user_id,
            schema_extensions: vec![SchemaExtension {
                schema: enterprise_id,
                required: false,
            }],
        })?;
        registry.register_resource_type(ResourceType {
            name: "Group".to_string(),
            schema: group_id,
            schema_extensions: Vec::new(),
        })?;

        Ok(registry)
    }

    /// Create a registry by loading `User.json` and `Group.json` schema
    /// documents from a directory.
    ///
    /// An `EnterpriseUser.json` file is picked up as a User extension when
    /// present.
    pub fn from_schema_dir<P: AsRef<Path>>(
        schema_dir: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = schema_dir.as_ref();
        let user: Schema = Self::load_schema_from_file(dir.join("User.json"))?;
        let group: Schema = Self::load_schema_from_file(dir.join("Group.json"))?;

        let mut registry = Self {
            schemas: HashMap::new(),
            resource_types: HashMap::new(),
        };

        let user_id = user.id.clone();
        let group_id = group.id.clone();
        registry.add_schema(user);
        registry.add_schema(group);

        let mut user_extensions = Vec::new();
        let enterprise_path = dir.join("EnterpriseUser.json");
        if enterprise_path.exists() {
            let enterprise = Self::load_schema_from_file(enterprise_path)?;
            user_extensions.push(SchemaExtension {
                schema: enterprise.id.clone(),
                required: false,
            });
            registry.add_schema(enterprise);
        }

        registry.register_resource_type(ResourceType {
            name: "User".to_string(),
            schema: user_id,
            schema_extensions: user_extensions,
        })?;
        registry.register_resource_type(ResourceType {
            name: "Group".to_string(),
            schema: group_id,
            schema_extensions: Vec::new(),
        })?;

        Ok(registry)
    }

    fn load_schema_from_file<P: AsRef<Path>>(
        path: P,
    ) -> Result<Schema, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Add a schema document to the registry.
    pub fn add_schema(&mut self, schema: Schema) {
        self.schemas.insert(schema.id.clone(), schema);
    }

    /// Register a resource type binding a base schema to its extensions.
    ///
    /// All referenced schemas must already be registered.
    pub fn register_resource_type(
        &mut self,
        resource_type: ResourceType,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !self.schemas.contains_key(&resource_type.schema) {
            return Err(format!(
                "resource type '{}' references unregistered schema '{}'",
                resource_type.name, resource_type.schema
            )
            .into());
        }
        for ext in &resource_type.schema_extensions {
            if !self.schemas.contains_key(&ext.schema) {
                return Err(format!(
                    "resource type '{}' references unregistered extension '{}'",
                    resource_type.name, ext.schema
                )
                .into());
            }
        }
        self.resource_types
            .insert(resource_type.name.clone(), resource_type);
        Ok(())
    }

    /// Get a schema by its URI.
    pub fn get_schema(&self, id: &str) -> Option<&Schema> {
        self.schemas.get(id)
    }

    /// Get a registered resource type by name.
    pub fn resource_type(&self, name: &str) -> Option<&ResourceType> {
        self.resource_types.get(name)
    }

    /// Whether `uri` names an extension schema of the given resource type.
    ///
    /// URI matching is case-sensitive.
    pub fn is_extension(&self, resource_type: &str, uri: &str) -> bool {
        self.resource_types
            .get(resource_type)
            .map(|rt| rt.schema_extensions.iter().any(|ext| ext.schema == uri))
            .unwrap_or(false)
    }

    /// The extension schemas declared for a resource type.
    pub fn extensions(&self, resource_type: &str) -> &[SchemaExtension] {
        self.resource_types
            .get(resource_type)
            .map(|rt| rt.schema_extensions.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve an attribute name against a resource type.
    ///
    /// Accepted forms:
    /// - `userName`, `name.givenName` — short forms matched against the base
    ///   schema first, then the declared extensions;
    /// - `urn:…:core:2.0:User:userName` — fully qualified, where the final
    ///   `:` separates the schema URI from the attribute name. The URI part
    ///   is case-sensitive, the local part is not.
    pub fn resolve_attribute(
        &self,
        resource_type: &str,
        name: &str,
    ) -> ScimResult<AttributeRef<'_>> {
        let rt = self
            .resource_types
            .get(resource_type)
            .ok_or_else(|| ScimError::unknown_attribute(name))?;

        if let Some(idx) = name.rfind(':') {
            let (uri, local) = (&name[..idx], &name[idx + 1..]);
            let schema = self
                .schema_for_uri(rt, uri)
                .ok_or_else(|| ScimError::unknown_attribute(name))?;
            return self
                .resolve_in_schema(schema, local)
                .ok_or_else(|| ScimError::unknown_attribute(name));
        }

        let base = self
            .schemas
            .get(&rt.schema)
            .ok_or_else(|| ScimError::unknown_attribute(name))?;
        if let Some(found) = self.resolve_in_schema(base, name) {
            return Ok(found);
        }
        for ext in &rt.schema_extensions {
            if let Some(schema) = self.schemas.get(&ext.schema) {
                if let Some(found) = self.resolve_in_schema(schema, name) {
                    return Ok(found);
                }
            }
        }
        Err(ScimError::unknown_attribute(name))
    }

    fn schema_for_uri<'a>(&'a self, rt: &ResourceType, uri: &str) -> Option<&'a Schema> {
        if rt.schema == uri {
            return self.schemas.get(&rt.schema);
        }
        rt.schema_extensions
            .iter()
            .find(|ext| ext.schema == uri)
            .and_then(|ext| self.schemas.get(&ext.schema))
    }

    fn resolve_in_schema<'a>(&self, schema: &'a Schema, local: &str) -> Option<AttributeRef<'a>> {
        let mut parts = local.splitn(2, '.');
        let base_name = parts.next()?;
        let sub_name = parts.next();
        // Anything deeper than attr.sub is not addressable.
        if sub_name.is_some_and(|s| s.contains('.')) {
            return None;
        }

        let attribute = schema.find_attribute(base_name)?;
        let sub_attribute = match sub_name {
            Some(sub) => Some(attribute.find_sub_attribute(sub)?),
            None => None,
        };
        Some(AttributeRef {
            schema_uri: &schema.id,
            attribute,
            sub_attribute,
        })
    }
}
