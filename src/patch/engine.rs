//! The RFC 7644 Section 3.5.2 patch engine.
//!
//! Applies `add`, `replace` and `remove` operations to a caller-owned
//! resource document. The engine works on a defensive copy and only hands
//! the mutated document back on success, so a failing operation leaves the
//! caller's resource untouched. Operations are applied sequentially in
//! list order; each operation observes the effects of the previous ones.
//!
//! An effective change is reported via [`PatchOutcome::changed`], computed
//! by deep equality against the pre-patch state: callers must not bump
//! `meta.lastModified` when `changed` is false.

use super::request::{PatchOpKind, PatchOperation, PatchRequest};
use super::resolver::{
    existing_parent_object, find_key, parent_object_mut, resolve_path, selected_indices,
    ResolvedPath,
};
use super::value::coerce_value;
use crate::error::{ScimError, ScimResult};
use crate::filter::parse_path;
use crate::schema::{AttributeDefinition, Mutability, SchemaRegistry};

use serde_json::{Map, Value};

/// The result of applying a patch request.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    /// The patched resource
    pub resource: Value,
    /// Whether the resource differs from its pre-patch state
    pub changed: bool,
}

/// Applies patch requests to resources of one resource type.
///
/// The engine borrows the process-wide [`SchemaRegistry`] and is cheap to
/// construct per request. It is synchronous, never suspends, and never
/// logs; failures are returned as classified [`ScimError`]s.
///
/// # Examples
///
/// ```rust
/// use scim_patch::patch::{PatchEngine, PatchOperation, PatchRequest};
/// use scim_patch::schema::SchemaRegistry;
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = SchemaRegistry::new()?;
/// let engine = PatchEngine::new(&registry, "User");
/// let resource = json!({"userName": "old"});
/// let request = PatchRequest::new(vec![PatchOperation::replace("userName", json!("new"))]);
/// let outcome = engine.apply(&resource, &request)?;
/// assert!(outcome.changed);
/// assert_eq!(outcome.resource["userName"], json!("new"));
/// # Ok(())
/// # }
/// ```
pub struct PatchEngine<'a> {
    registry: &'a SchemaRegistry,
    resource_type: String,
}

impl<'a> PatchEngine<'a> {
    pub fn new(registry: &'a SchemaRegistry, resource_type: impl Into<String>) -> Self {
        Self {
            registry,
            resource_type: resource_type.into(),
        }
    }

    /// Apply a patch request to a resource.
    ///
    /// On error the caller's resource is guaranteed untouched; partial
    /// application never escapes this function.
    pub fn apply(&self, resource: &Value, request: &PatchRequest) -> ScimResult<PatchOutcome> {
        request.validate()?;
        if !resource.is_object() {
            return Err(ScimError::invalid_syntax("resource must be a JSON object"));
        }

        let mut working = resource.clone();
        for operation in &request.operations {
            self.apply_operation(&mut working, operation)?;
        }

        let changed = working != *resource;
        Ok(PatchOutcome {
            resource: working,
            changed,
        })
    }

    fn apply_operation(&self, doc: &mut Value, operation: &PatchOperation) -> ScimResult<()> {
        let values = operation.values();
        match operation.op {
            PatchOpKind::Add => match operation.path.as_deref() {
                Some(raw) => {
                    let path = self.resolve(raw)?;
                    self.apply_add(doc, &path, &values)
                }
                None => self.apply_root_add(doc, &values),
            },
            PatchOpKind::Replace => match operation.path.as_deref() {
                Some(raw) => {
                    let path = self.resolve(raw)?;
                    self.apply_replace(doc, &path, &values)
                }
                None => self.apply_root_replace(doc, &values),
            },
            PatchOpKind::Remove => {
                if !values.is_empty() {
                    return Err(ScimError::invalid_path(
                        operation.path.as_deref().unwrap_or_default(),
                        "values must not be set for a remove operation",
                    ));
                }
                let raw = operation.path.as_deref().ok_or_else(|| {
                    ScimError::invalid_path("", "no target present within the request")
                })?;
                let path = self.resolve(raw)?;
                self.apply_remove(doc, &path)
            }
        }
    }

    fn resolve(&self, raw: &str) -> ScimResult<ResolvedPath> {
        let parsed = parse_path(raw)?;
        resolve_path(self.registry, &self.resource_type, &parsed, raw)
    }

    // -----------------------------------------------------------------
    // add
    // -----------------------------------------------------------------

    fn apply_add(&self, doc: &mut Value, path: &ResolvedPath, values: &[Value]) -> ScimResult<()> {
        if values.is_empty() {
            return Err(ScimError::invalid_value(
                "value parameter must be set for an add operation",
            ));
        }
        // emails[type eq "x"] without a sub-attribute has no meaning for add.
        if path.filter.is_some() && path.sub_attribute.is_none() {
            return Err(ScimError::invalid_path(
                &path.raw,
                format!(
                    "a value filter is not valid for an add operation; \
                     did you mean '{}.subAttribute'?",
                    path.raw
                ),
            ));
        }
        self.check_writable(path)?;

        let parent = parent_object_mut(doc, path)?;
        let attr = &path.attribute;

        if !attr.is_complex() {
            return if attr.multi_valued {
                append_simple_values(parent, attr, values)
            } else {
                if values.len() != 1 {
                    return Err(multiple_values_error(attr));
                }
                let leaf = coerce_value(attr, &values[0])?;
                set_simple_node(parent, attr, leaf)
            };
        }

        if attr.multi_valued {
            return match &path.sub_attribute {
                Some(sub) => {
                    let array = required_array_mut(parent, path)?;
                    let indices = selected_indices(array, path)?;
                    for index in indices {
                        let element = element_object_mut(array, index, attr)?;
                        add_to_complex_member(element, sub, values)?;
                    }
                    Ok(())
                }
                None => {
                    let array = array_entry_mut(parent, attr)?;
                    for value in values {
                        let object = require_object(value, attr)?;
                        array.push(Value::Object(object.clone()));
                    }
                    Ok(())
                }
            };
        }

        // Single-valued complex.
        match &path.sub_attribute {
            Some(sub) => {
                let object = object_entry_mut(parent, attr)?;
                add_to_complex_member(object, sub, values)
            }
            None => {
                if values.len() != 1 {
                    return Err(ScimError::invalid_value(format!(
                        "found multiple or no values for non multi-valued complex type '{}'",
                        attr.name
                    )));
                }
                let new_object = require_object(&values[0], attr)?.clone();
                let key = find_key(parent, &attr.name).unwrap_or_else(|| attr.name.clone());
                let merged = merge_object_nodes(new_object, parent.get(&key));
                parent.insert(key, Value::Object(merged));
                Ok(())
            }
        }
    }

    /// Add without a path: the value object is merged into the root, with
    /// complex-merge semantics applied per top-level attribute.
    fn apply_root_add(&self, doc: &mut Value, values: &[Value]) -> ScimResult<()> {
        let incoming = self.root_value_object(values, "add")?;
        for key in incoming.keys() {
            self.check_root_key(key)?;
        }
        let root = doc
            .as_object_mut()
            .ok_or_else(|| ScimError::invalid_syntax("resource must be a JSON object"))?;

        for (key, new_value) in &incoming {
            let existing_key = find_key(root, key).unwrap_or_else(|| key.clone());
            let merged = match (root.get(&existing_key), new_value) {
                (Some(Value::Object(_)), Value::Object(new_object)) => Value::Object(
                    merge_object_nodes(new_object.clone(), root.get(&existing_key)),
                ),
                (Some(Value::Array(old_items)), Value::Array(new_items)) => {
                    let mut items = old_items.clone();
                    items.extend(new_items.iter().cloned());
                    Value::Array(items)
                }
                _ => new_value.clone(),
            };
            root.insert(existing_key, merged);
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // replace
    // -----------------------------------------------------------------

    fn apply_replace(
        &self,
        doc: &mut Value,
        path: &ResolvedPath,
        values: &[Value],
    ) -> ScimResult<()> {
        if values.is_empty() {
            return Err(ScimError::invalid_value(
                "value parameter must be set for a replace operation",
            ));
        }
        self.check_writable(path)?;

        let parent = parent_object_mut(doc, path)?;
        let attr = &path.attribute;

        if !attr.is_complex() {
            return if attr.multi_valued {
                // Whole-array replacement.
                let mut array = Vec::with_capacity(values.len());
                for value in values {
                    array.push(coerce_value(attr, value)?);
                }
                let key = find_key(parent, &attr.name).unwrap_or_else(|| attr.name.clone());
                parent.insert(key, Value::Array(array));
                Ok(())
            } else {
                if values.len() != 1 {
                    return Err(multiple_values_error(attr));
                }
                let leaf = coerce_value(attr, &values[0])?;
                set_simple_node(parent, attr, leaf)
            };
        }

        if attr.multi_valued {
            return match (&path.filter, &path.sub_attribute) {
                (None, None) => {
                    // Whole-array replacement with complex elements.
                    let mut array = Vec::with_capacity(values.len());
                    for value in values {
                        array.push(Value::Object(require_object(value, attr)?.clone()));
                    }
                    let key = find_key(parent, &attr.name).unwrap_or_else(|| attr.name.clone());
                    parent.insert(key, Value::Array(array));
                    Ok(())
                }
                (_, Some(sub)) => {
                    let array = required_array_mut(parent, path)?;
                    let indices = selected_indices(array, path)?;
                    for index in indices {
                        let element = element_object_mut(array, index, attr)?;
                        replace_in_complex_member(element, sub, values)?;
                    }
                    Ok(())
                }
                (Some(_), None) => {
                    // Each matching element is replaced wholesale.
                    if values.len() != 1 {
                        return Err(ScimError::invalid_value(format!(
                            "exactly one replacement value is expected for '{}'",
                            path.raw
                        )));
                    }
                    let Value::Object(replacement) = &values[0] else {
                        return Err(ScimError::invalid_path(
                            &path.raw,
                            "the value must be a complex JSON object for a filtered replace",
                        ));
                    };
                    let array = required_array_mut(parent, path)?;
                    let indices = selected_indices(array, path)?;
                    for index in indices {
                        array[index] = Value::Object(replacement.clone());
                    }
                    Ok(())
                }
            };
        }

        // Single-valued complex.
        match &path.sub_attribute {
            Some(sub) => {
                let object = object_entry_mut(parent, attr)?;
                replace_in_complex_member(object, sub, values)
            }
            None => {
                if values.len() != 1 {
                    return Err(ScimError::invalid_value(format!(
                        "found multiple or no values for non multi-valued complex type '{}'",
                        attr.name
                    )));
                }
                // Deep replace, not merge.
                let object = require_object(&values[0], attr)?.clone();
                let key = find_key(parent, &attr.name).unwrap_or_else(|| attr.name.clone());
                parent.insert(key, Value::Object(object));
                Ok(())
            }
        }
    }

    /// Replace without a path: each top-level key of the value object
    /// overwrites the corresponding root attribute.
    fn apply_root_replace(&self, doc: &mut Value, values: &[Value]) -> ScimResult<()> {
        let incoming = self.root_value_object(values, "replace")?;
        for key in incoming.keys() {
            self.check_root_key(key)?;
        }
        let root = doc
            .as_object_mut()
            .ok_or_else(|| ScimError::invalid_syntax("resource must be a JSON object"))?;
        for (key, value) in &incoming {
            let existing_key = find_key(root, key).unwrap_or_else(|| key.clone());
            root.insert(existing_key, value.clone());
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // remove
    // -----------------------------------------------------------------

    fn apply_remove(&self, doc: &mut Value, path: &ResolvedPath) -> ScimResult<()> {
        self.check_removable(path)?;

        let Some(parent) = existing_parent_object(doc, path)? else {
            return Err(ScimError::no_target(&path.raw));
        };
        let attr = &path.attribute;
        let Some(key) = find_key(parent, &attr.name) else {
            return Err(ScimError::no_target(&path.raw));
        };

        if attr.is_complex() && attr.multi_valued {
            match (&path.filter, &path.sub_attribute) {
                (None, None) => {
                    parent.remove(&key);
                }
                (Some(_), None) => {
                    let array = required_array_mut(parent, path)?;
                    let indices = selected_indices(array, path)?;
                    for index in indices.iter().rev() {
                        array.remove(*index);
                    }
                    if array.is_empty() {
                        parent.remove(&key);
                    }
                }
                (_, Some(sub)) => {
                    let array = required_array_mut(parent, path)?;
                    let indices = selected_indices(array, path)?;
                    for index in indices {
                        let element = element_object_mut(array, index, attr)?;
                        if let Some(sub_key) = find_key(element, &sub.name) {
                            element.remove(&sub_key);
                        }
                    }
                }
            }
        } else if let Some(sub) = &path.sub_attribute {
            let object = parent
                .get_mut(&key)
                .and_then(Value::as_object_mut)
                .ok_or_else(|| not_an_object_error(attr))?;
            let Some(sub_key) = find_key(object, &sub.name) else {
                return Err(ScimError::no_target(&path.raw));
            };
            object.remove(&sub_key);
        } else {
            parent.remove(&key);
        }

        // An extension object emptied by the removal disappears from the
        // root together with its URI key.
        if path.extension {
            if let Some(root) = doc.as_object_mut() {
                let emptied = root
                    .get(&path.schema_uri)
                    .and_then(Value::as_object)
                    .map(Map::is_empty)
                    .unwrap_or(false);
                if emptied {
                    root.remove(&path.schema_uri);
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // shared checks
    // -----------------------------------------------------------------

    fn check_writable(&self, path: &ResolvedPath) -> ScimResult<()> {
        if path.attribute.mutability == Mutability::ReadOnly {
            return Err(ScimError::mutability(
                &path.attribute.name,
                "attribute is readOnly",
            ));
        }
        if let Some(sub) = &path.sub_attribute {
            if sub.mutability == Mutability::ReadOnly {
                return Err(ScimError::mutability(
                    format!("{}.{}", path.attribute.name, sub.name),
                    "attribute is readOnly",
                ));
            }
        }
        Ok(())
    }

    fn check_removable(&self, path: &ResolvedPath) -> ScimResult<()> {
        self.check_writable(path)?;
        let target = path.target();
        if target.required {
            return Err(ScimError::mutability(
                &target.name,
                "a required attribute cannot be removed",
            ));
        }
        Ok(())
    }

    fn root_value_object(&self, values: &[Value], op: &str) -> ScimResult<Map<String, Value>> {
        if values.len() != 1 {
            return Err(ScimError::invalid_value(format!(
                "a {} operation without a path takes exactly one object value",
                op
            )));
        }
        values[0]
            .as_object()
            .cloned()
            .ok_or_else(|| {
                ScimError::invalid_value(format!(
                    "the value must be a JSON object for a {} operation without a path",
                    op
                ))
            })
    }

    /// Top-level keys of a pathless value object must resolve against the
    /// registry: plain attributes, extension URIs, or the `schemas` list.
    fn check_root_key(&self, key: &str) -> ScimResult<()> {
        if key.eq_ignore_ascii_case("schemas") {
            return Ok(());
        }
        if self.registry.is_extension(&self.resource_type, key) {
            return Ok(());
        }
        let attr = self.registry.resolve_attribute(&self.resource_type, key)?;
        if attr.attribute.mutability == Mutability::ReadOnly {
            return Err(ScimError::mutability(
                &attr.attribute.name,
                "attribute is readOnly",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// node-level helpers (the cursor operations)
// ---------------------------------------------------------------------

/// Set a simple leaf under its parent object, enforcing immutability.
fn set_simple_node(
    parent: &mut Map<String, Value>,
    attr: &AttributeDefinition,
    leaf: Value,
) -> ScimResult<()> {
    let key = find_key(parent, &attr.name).unwrap_or_else(|| attr.name.clone());
    if attr.mutability == Mutability::Immutable {
        if let Some(old) = parent.get(&key) {
            if *old != leaf {
                return Err(ScimError::mutability(
                    &attr.name,
                    "attribute is immutable and already has a different value",
                ));
            }
        }
    }
    parent.insert(key, leaf);
    Ok(())
}

/// Append coerced values to a multi-valued simple attribute, skipping
/// values already present so repeated adds stay idempotent.
fn append_simple_values(
    parent: &mut Map<String, Value>,
    attr: &AttributeDefinition,
    values: &[Value],
) -> ScimResult<()> {
    let array = array_entry_mut(parent, attr)?;
    for value in values {
        let leaf = coerce_value(attr, value)?;
        if !array.contains(&leaf) {
            array.push(leaf);
        }
    }
    Ok(())
}

/// Apply an add to one member of a complex attribute.
fn add_to_complex_member(
    element: &mut Map<String, Value>,
    sub: &AttributeDefinition,
    values: &[Value],
) -> ScimResult<()> {
    if sub.multi_valued {
        append_simple_values(element, sub, values)
    } else {
        if values.len() != 1 {
            return Err(multiple_values_error(sub));
        }
        let leaf = coerce_value(sub, &values[0])?;
        set_simple_node(element, sub, leaf)
    }
}

/// Apply a replace to one member of a complex attribute.
fn replace_in_complex_member(
    element: &mut Map<String, Value>,
    sub: &AttributeDefinition,
    values: &[Value],
) -> ScimResult<()> {
    if sub.multi_valued {
        let mut array = Vec::with_capacity(values.len());
        for value in values {
            array.push(coerce_value(sub, value)?);
        }
        let key = find_key(element, &sub.name).unwrap_or_else(|| sub.name.clone());
        element.insert(key, Value::Array(array));
        Ok(())
    } else {
        if values.len() != 1 {
            return Err(multiple_values_error(sub));
        }
        let leaf = coerce_value(sub, &values[0])?;
        set_simple_node(element, sub, leaf)
    }
}

/// Merge a complex value into an existing one.
///
/// Keys present only in the old object are carried over; where both sides
/// hold arrays the result is the old elements followed by the new ones,
/// without deduplication.
fn merge_object_nodes(
    mut new_object: Map<String, Value>,
    old_value: Option<&Value>,
) -> Map<String, Value> {
    let Some(Value::Object(old_object)) = old_value else {
        return new_object;
    };
    for (key, old_entry) in old_object {
        match new_object.get_mut(key) {
            None => {
                new_object.insert(key.clone(), old_entry.clone());
            }
            Some(Value::Array(new_items)) => {
                if let Value::Array(old_items) = old_entry {
                    let appended = std::mem::take(new_items);
                    let mut merged = old_items.clone();
                    merged.extend(appended);
                    *new_items = merged;
                }
            }
            Some(_) => {}
        }
    }
    new_object
}

/// The attribute's array, created empty when absent.
fn array_entry_mut<'m>(
    parent: &'m mut Map<String, Value>,
    attr: &AttributeDefinition,
) -> ScimResult<&'m mut Vec<Value>> {
    let key = find_key(parent, &attr.name).unwrap_or_else(|| attr.name.clone());
    parent
        .entry(key)
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| not_an_array_error(attr))
}

/// The attribute's object, created empty when absent.
fn object_entry_mut<'m>(
    parent: &'m mut Map<String, Value>,
    attr: &AttributeDefinition,
) -> ScimResult<&'m mut Map<String, Value>> {
    let key = find_key(parent, &attr.name).unwrap_or_else(|| attr.name.clone());
    parent
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| not_an_object_error(attr))
}

/// The attribute's array, required non-empty for sub-attribute targets.
fn required_array_mut<'m>(
    parent: &'m mut Map<String, Value>,
    path: &ResolvedPath,
) -> ScimResult<&'m mut Vec<Value>> {
    let attr = &path.attribute;
    let Some(key) = find_key(parent, &attr.name) else {
        return Err(ScimError::no_target(&path.raw));
    };
    let array = parent
        .get_mut(&key)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| not_an_array_error(attr))?;
    if array.is_empty() {
        return Err(ScimError::no_target(&path.raw));
    }
    Ok(array)
}

fn element_object_mut<'m>(
    array: &'m mut [Value],
    index: usize,
    attr: &AttributeDefinition,
) -> ScimResult<&'m mut Map<String, Value>> {
    array
        .get_mut(index)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            ScimError::invalid_value(format!(
                "members of the multi-valued complex attribute '{}' must be JSON objects",
                attr.name
            ))
        })
}

fn require_object<'v>(
    value: &'v Value,
    attr: &AttributeDefinition,
) -> ScimResult<&'v Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        ScimError::invalid_value(format!(
            "the value is not a complex JSON representation for attribute '{}'",
            attr.name
        ))
    })
}

fn multiple_values_error(attr: &AttributeDefinition) -> ScimError {
    ScimError::invalid_value(format!(
        "several values found for non multi-valued attribute '{}'",
        attr.name
    ))
}

fn not_an_array_error(attr: &AttributeDefinition) -> ScimError {
    ScimError::invalid_value(format!(
        "multi-valued attribute '{}' is not stored as an array",
        attr.name
    ))
}

fn not_an_object_error(attr: &AttributeDefinition) -> ScimError {
    ScimError::invalid_value(format!(
        "complex attribute '{}' is not stored as an object",
        attr.name
    ))
}
