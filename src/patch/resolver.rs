//! Resolution of parsed patch paths against the schema registry, and the
//! document-walking helpers the engine mutates through.
//!
//! A [`ResolvedPath`] binds the syntactic [`PathExpr`] to attribute
//! definitions: the top-level attribute (with its schema URI and extension
//! flag), the optional value filter, and the optional sub-attribute. The
//! engine then addresses each mutation site as a cursor — a parent
//! container plus the key or index at which the mutation occurs — which
//! keeps "absent" distinguishable from "present but null" and lets the
//! walk create missing intermediate containers on add/replace.

use crate::error::{ScimError, ScimResult};
use crate::filter::ast::{FilterExpr, PathExpr};
use crate::filter::eval::evaluate_filter_with;
use crate::schema::{AttributeDefinition, SchemaRegistry};

use serde_json::{Map, Value};

/// A patch path bound to schema definitions.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    /// Original path text, for error reporting
    pub raw: String,
    /// URI of the schema declaring the attribute
    pub schema_uri: String,
    /// Whether the attribute lives in an extension schema
    pub extension: bool,
    /// The top-level attribute definition
    pub attribute: AttributeDefinition,
    /// Value filter attached to the attribute segment
    pub filter: Option<FilterExpr>,
    /// The trailing sub-attribute definition
    pub sub_attribute: Option<AttributeDefinition>,
}

impl ResolvedPath {
    /// The definition the operation ultimately targets.
    pub fn target(&self) -> &AttributeDefinition {
        self.sub_attribute.as_ref().unwrap_or(&self.attribute)
    }
}

/// Bind a parsed path to the registry for a resource type.
///
/// Semantic constraints enforced here:
/// - at most two attribute levels (`attr` or `attr.sub`);
/// - a value filter may only be attached to the first segment, and only
///   when that attribute is multi-valued and COMPLEX;
/// - a sub-attribute requires a COMPLEX top-level attribute.
pub fn resolve_path(
    registry: &SchemaRegistry,
    resource_type: &str,
    path: &PathExpr,
    raw: &str,
) -> ScimResult<ResolvedPath> {
    if path.segments.is_empty() || path.segments.len() > 2 {
        return Err(ScimError::invalid_path(
            raw,
            "path must name an attribute, optionally followed by one sub-attribute",
        ));
    }
    for (index, segment) in path.segments.iter().enumerate() {
        if index != 0 && segment.filter.is_some() {
            return Err(ScimError::invalid_path(
                raw,
                "a value filter may only follow the multi-valued attribute segment",
            ));
        }
    }

    let local = path
        .segments
        .iter()
        .map(|seg| seg.name.as_str())
        .collect::<Vec<_>>()
        .join(".");
    let qualified = match &path.uri {
        Some(uri) => format!("{}:{}", uri, local),
        None => local,
    };

    let attr_ref = registry.resolve_attribute(resource_type, &qualified)?;
    let filter = path.segments[0].filter.clone();

    if filter.is_some() && !(attr_ref.attribute.multi_valued && attr_ref.attribute.is_complex()) {
        return Err(ScimError::invalid_path(
            raw,
            format!(
                "attribute '{}' is not a multi-valued complex attribute and cannot be filtered",
                attr_ref.attribute.name
            ),
        ));
    }
    if attr_ref.sub_attribute.is_some() && !attr_ref.attribute.is_complex() {
        return Err(ScimError::invalid_path(
            raw,
            format!(
                "attribute '{}' has no sub-attributes",
                attr_ref.attribute.name
            ),
        ));
    }

    Ok(ResolvedPath {
        raw: raw.to_string(),
        schema_uri: attr_ref.schema_uri.to_string(),
        extension: registry.is_extension(resource_type, attr_ref.schema_uri),
        attribute: attr_ref.attribute.clone(),
        filter,
        sub_attribute: attr_ref.sub_attribute.cloned(),
    })
}

/// Case-insensitive key lookup returning the stored spelling.
///
/// Attribute names are case-insensitive on lookup but preserved verbatim on
/// emit, so mutations must address the key exactly as the document spells
/// it.
pub(crate) fn find_key(object: &Map<String, Value>, name: &str) -> Option<String> {
    object
        .keys()
        .find(|key| key.eq_ignore_ascii_case(name))
        .cloned()
}

/// The object containing the first path segment, creating the extension
/// object on demand.
///
/// For attributes of the primary schema this is the resource root; for
/// extension attributes it is the nested object keyed by the extension URI,
/// created when absent.
pub(crate) fn parent_object_mut<'a>(
    root: &'a mut Value,
    path: &ResolvedPath,
) -> ScimResult<&'a mut Map<String, Value>> {
    let root = root
        .as_object_mut()
        .ok_or_else(|| ScimError::invalid_syntax("resource must be a JSON object"))?;
    if !path.extension {
        return Ok(root);
    }
    root.entry(path.schema_uri.clone())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| {
            ScimError::invalid_value(format!(
                "extension '{}' is not a JSON object",
                path.schema_uri
            ))
        })
}

/// The object containing the first path segment, without creating anything.
///
/// Returns `None` when the extension object is absent (the remove walk
/// never creates containers).
pub(crate) fn existing_parent_object<'a>(
    root: &'a mut Value,
    path: &ResolvedPath,
) -> ScimResult<Option<&'a mut Map<String, Value>>> {
    let root = root
        .as_object_mut()
        .ok_or_else(|| ScimError::invalid_syntax("resource must be a JSON object"))?;
    if !path.extension {
        return Ok(Some(root));
    }
    match root.get(&path.schema_uri) {
        None => return Ok(None),
        Some(Value::Object(_)) => {}
        Some(_) => {
            return Err(ScimError::invalid_value(format!(
                "extension '{}' is not a JSON object",
                path.schema_uri
            )))
        }
    }
    Ok(root.get_mut(&path.schema_uri).and_then(Value::as_object_mut))
}

/// Indices of the array elements selected by the path's value filter.
///
/// Without a filter every element is selected. An attached filter matching
/// nothing signals `noTarget`.
pub(crate) fn selected_indices(
    array: &[Value],
    path: &ResolvedPath,
) -> ScimResult<Vec<usize>> {
    match &path.filter {
        None => Ok((0..array.len()).collect()),
        Some(filter) => {
            let indices = evaluate_filter_with(filter, array, Some(&path.attribute))?;
            if indices.is_empty() {
                return Err(ScimError::no_target(&path.raw));
            }
            Ok(indices)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScimType;
    use crate::filter::parse_path;
    use crate::schema::{AttributeType, SchemaRegistry};
    use serde_json::json;

    const ENTERPRISE_URI: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

    fn registry() -> SchemaRegistry {
        SchemaRegistry::with_embedded_schemas().unwrap()
    }

    fn resolve(raw: &str) -> ScimResult<ResolvedPath> {
        let registry = registry();
        let parsed = parse_path(raw)?;
        resolve_path(&registry, "User", &parsed, raw)
    }

    #[test]
    fn resolves_simple_and_dotted_paths() {
        let path = resolve("userName").unwrap();
        assert_eq!(path.attribute.name, "userName");
        assert!(!path.extension);
        assert!(path.sub_attribute.is_none());

        let path = resolve("name.givenName").unwrap();
        assert_eq!(path.target().name, "givenName");
    }

    #[test]
    fn resolves_filtered_path() {
        let path = resolve("emails[type eq \"work\"].value").unwrap();
        assert_eq!(path.attribute.name, "emails");
        assert!(path.filter.is_some());
        assert_eq!(path.sub_attribute.as_ref().unwrap().name, "value");
    }

    #[test]
    fn resolves_extension_path() {
        let raw = format!("{ENTERPRISE_URI}:department");
        let path = resolve(&raw).unwrap();
        assert!(path.extension);
        assert_eq!(path.schema_uri, ENTERPRISE_URI);
        assert_eq!(path.attribute.data_type, AttributeType::String);
    }

    #[test]
    fn filter_on_simple_attribute_is_invalid_path() {
        let err = resolve("userName[value eq \"x\"]").unwrap_err();
        assert_eq!(err.scim_type(), ScimType::InvalidPath);
    }

    #[test]
    fn filter_on_single_valued_complex_is_invalid_path() {
        let err = resolve("name[givenName eq \"x\"].familyName").unwrap_err();
        assert_eq!(err.scim_type(), ScimType::InvalidPath);
    }

    #[test]
    fn unknown_attribute_is_invalid_path() {
        let err = resolve("badAttr").unwrap_err();
        assert_eq!(err.scim_type(), ScimType::InvalidPath);
    }

    #[test]
    fn parent_object_creates_extension_on_demand() {
        let path = resolve(&format!("{ENTERPRISE_URI}:department")).unwrap();
        let mut doc = json!({});
        let parent = parent_object_mut(&mut doc, &path).unwrap();
        parent.insert("department".to_string(), json!("Eng"));
        assert_eq!(doc[ENTERPRISE_URI]["department"], json!("Eng"));
    }

    #[test]
    fn existing_parent_does_not_create_extension() {
        let path = resolve(&format!("{ENTERPRISE_URI}:department")).unwrap();
        let mut doc = json!({});
        assert!(existing_parent_object(&mut doc, &path).unwrap().is_none());
        assert_eq!(doc, json!({}));
    }

    #[test]
    fn find_key_preserves_stored_spelling() {
        let mut map = Map::new();
        map.insert("UserName".to_string(), json!("x"));
        assert_eq!(find_key(&map, "username").as_deref(), Some("UserName"));
        assert!(find_key(&map, "other").is_none());
    }

    #[test]
    fn selected_indices_without_filter_covers_all() {
        let path = resolve("emails").unwrap();
        let array = vec![json!({"type": "work"}), json!({"type": "home"})];
        assert_eq!(selected_indices(&array, &path).unwrap(), vec![0, 1]);
    }

    #[test]
    fn selected_indices_with_filter_matching_nothing_is_no_target() {
        let path = resolve("emails[type eq \"work\"].value").unwrap();
        let array = vec![json!({"type": "home"})];
        let err = selected_indices(&array, &path).unwrap_err();
        assert_eq!(err.scim_type(), ScimType::NoTarget);
    }
}
