//! Unit tests for schema types and registry resolution.

use super::*;
use crate::error::ScimType;

const USER_URI: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
const ENTERPRISE_URI: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

fn registry() -> SchemaRegistry {
    SchemaRegistry::with_embedded_schemas().expect("embedded schemas must parse")
}

#[test]
fn embedded_schemas_register_core_resource_types() {
    let registry = registry();
    assert!(registry.get_schema(USER_URI).is_some());
    assert!(registry.get_schema(ENTERPRISE_URI).is_some());
    assert_eq!(registry.resource_type("User").unwrap().schema, USER_URI);
    assert_eq!(registry.extensions("User").len(), 1);
    assert!(registry.extensions("Group").is_empty());
}

#[test]
fn resolve_short_form_is_case_insensitive() {
    let registry = registry();
    let attr = registry.resolve_attribute("User", "USERNAME").unwrap();
    // Canonical spelling is preserved for emit.
    assert_eq!(attr.attribute.name, "userName");
    assert_eq!(attr.schema_uri, USER_URI);
    assert!(attr.sub_attribute.is_none());
}

#[test]
fn resolve_dotted_sub_attribute() {
    let registry = registry();
    let attr = registry.resolve_attribute("User", "name.givenname").unwrap();
    assert_eq!(attr.attribute.name, "name");
    assert_eq!(attr.sub_attribute.unwrap().name, "givenName");
    assert_eq!(attr.target().name, "givenName");
}

#[test]
fn resolve_fully_qualified_name() {
    let registry = registry();
    let attr = registry
        .resolve_attribute("User", &format!("{USER_URI}:emails.value"))
        .unwrap();
    assert_eq!(attr.attribute.name, "emails");
    assert_eq!(attr.sub_attribute.unwrap().name, "value");
}

#[test]
fn resolve_extension_attribute_short_and_qualified() {
    let registry = registry();
    let short = registry.resolve_attribute("User", "department").unwrap();
    assert_eq!(short.schema_uri, ENTERPRISE_URI);

    let qualified = registry
        .resolve_attribute("User", &format!("{ENTERPRISE_URI}:manager.displayName"))
        .unwrap();
    assert_eq!(qualified.attribute.name, "manager");
    assert_eq!(qualified.sub_attribute.unwrap().name, "displayName");
}

#[test]
fn uri_part_is_case_sensitive() {
    let registry = registry();
    let upper = format!("{}:userName", USER_URI.to_uppercase());
    let err = registry.resolve_attribute("User", &upper).unwrap_err();
    assert_eq!(err.scim_type(), ScimType::InvalidPath);
}

#[test]
fn unknown_attribute_fails_resolution() {
    let registry = registry();
    assert!(registry.resolve_attribute("User", "badAttr").is_err());
    assert!(registry.resolve_attribute("User", "name.badSub").is_err());
    assert!(registry
        .resolve_attribute("User", "name.givenName.deeper")
        .is_err());
}

#[test]
fn is_extension_is_scoped_to_resource_type() {
    let registry = registry();
    assert!(registry.is_extension("User", ENTERPRISE_URI));
    assert!(!registry.is_extension("Group", ENTERPRISE_URI));
    assert!(!registry.is_extension("User", USER_URI));
}

#[test]
fn custom_resource_type_resolves_after_registration() {
    let mut registry = registry();
    let schema: Schema = serde_json::from_str(
        r#"{
            "id": "urn:example:params:scim:schemas:custom:2.0:Device",
            "name": "Device",
            "description": "Device",
            "attributes": [
                {
                    "name": "serialNumber",
                    "type": "string",
                    "multiValued": false,
                    "required": true,
                    "caseExact": true,
                    "mutability": "immutable",
                    "uniqueness": "server"
                }
            ]
        }"#,
    )
    .unwrap();
    registry.add_schema(schema);
    registry
        .register_resource_type(ResourceType {
            name: "Device".to_string(),
            schema: "urn:example:params:scim:schemas:custom:2.0:Device".to_string(),
            schema_extensions: Vec::new(),
        })
        .unwrap();

    let attr = registry.resolve_attribute("Device", "serialnumber").unwrap();
    assert_eq!(attr.attribute.mutability, Mutability::Immutable);
}

#[test]
fn register_resource_type_rejects_unknown_schema() {
    let mut registry = registry();
    let result = registry.register_resource_type(ResourceType {
        name: "Thing".to_string(),
        schema: "urn:example:missing".to_string(),
        schema_extensions: Vec::new(),
    });
    assert!(result.is_err());
}
