//! Host-side interfaces the patch core is wired into.
//!
//! The engine itself is synchronous and storage-agnostic; this module
//! carries the async [`ResourceStore`] contract a host implements over its
//! persistence, a ready-made [`InMemoryStore`], and the [`patch_resource`]
//! glue that loads a resource, applies a patch, maintains `meta`, and
//! stores the result.
//!
//! `meta.lastModified` is only bumped when the patch made an effective
//! change; a no-op patch stores nothing and returns the loaded version
//! untouched.

pub mod in_memory;
pub mod version;

use crate::error::ScimError;
use crate::patch::{PatchEngine, PatchRequest};
use crate::schema::SchemaRegistry;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use log::debug;
use serde_json::{Map, Value};

pub use in_memory::{InMemoryStore, InMemoryStoreError};
pub use version::ResourceVersion;

/// A resource document together with its stored version.
#[derive(Debug, Clone)]
pub struct VersionedResource {
    pub resource: Value,
    pub version: ResourceVersion,
}

/// Storage contract consumed by the patch glue.
///
/// Implementations address resources by `(resource type, id)` and return a
/// content-derived version on every store; concurrency control built on
/// those versions belongs to the transport layer.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a resource, or `None` when it does not exist.
    async fn load(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<VersionedResource>, Self::Error>;

    /// Store a resource, returning its new version.
    async fn store(
        &self,
        resource_type: &str,
        id: &str,
        resource: Value,
    ) -> Result<ResourceVersion, Self::Error>;
}

/// Errors from the load-patch-store flow.
#[derive(Debug, thiserror::Error)]
pub enum PatchApplyError<E> {
    #[error("resource not found: {resource_type} with id '{id}'")]
    NotFound { resource_type: String, id: String },

    #[error(transparent)]
    Scim(#[from] ScimError),

    #[error("store error: {0}")]
    Store(#[source] E),
}

/// The result of patching a stored resource.
#[derive(Debug, Clone)]
pub struct PatchedResource {
    pub resource: Value,
    pub version: ResourceVersion,
    pub changed: bool,
}

/// Load a resource, apply a patch request, and store the result.
///
/// On an effective change, `meta.lastModified` is set to the current time
/// before storing. When the patch is a no-op the stored resource and its
/// version are left untouched, per the no-op suppression rule of
/// RFC 7644 Section 3.5.2.
pub async fn patch_resource<S: ResourceStore>(
    store: &S,
    registry: &SchemaRegistry,
    resource_type: &str,
    id: &str,
    request: &PatchRequest,
) -> Result<PatchedResource, PatchApplyError<S::Error>> {
    let loaded = store
        .load(resource_type, id)
        .await
        .map_err(PatchApplyError::Store)?
        .ok_or_else(|| PatchApplyError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        })?;

    let engine = PatchEngine::new(registry, resource_type);
    let outcome = engine.apply(&loaded.resource, request)?;

    if !outcome.changed {
        debug!(
            "patch on {}/{} made no effective change, skipping store",
            resource_type, id
        );
        return Ok(PatchedResource {
            resource: outcome.resource,
            version: loaded.version,
            changed: false,
        });
    }

    let mut resource = outcome.resource;
    touch_last_modified(&mut resource);
    let version = store
        .store(resource_type, id, resource.clone())
        .await
        .map_err(PatchApplyError::Store)?;
    debug!(
        "patched {}/{} with {} operation(s), new version {}",
        resource_type,
        id,
        request.operations.len(),
        version
    );

    Ok(PatchedResource {
        resource,
        version,
        changed: true,
    })
}

fn touch_last_modified(resource: &mut Value) {
    let Some(root) = resource.as_object_mut() else {
        return;
    };
    let meta = root
        .entry("meta".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(meta) = meta.as_object_mut() {
        meta.insert(
            "lastModified".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchOperation;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let _ = env_logger::builder().is_test(true).try_init();
        SchemaRegistry::with_embedded_schemas().unwrap()
    }

    #[tokio::test]
    async fn patching_a_stored_resource_bumps_meta_and_version() {
        let store = InMemoryStore::new();
        let registry = registry();
        let initial_version = store
            .store("User", "1", json!({"userName": "old"}))
            .await
            .unwrap();

        let request = PatchRequest::new(vec![PatchOperation::replace("userName", json!("new"))]);
        let patched = patch_resource(&store, &registry, "User", "1", &request)
            .await
            .unwrap();

        assert!(patched.changed);
        assert_eq!(patched.resource["userName"], json!("new"));
        assert!(patched.resource["meta"]["lastModified"].is_string());
        assert_ne!(patched.version, initial_version);

        let reloaded = store.load("User", "1").await.unwrap().unwrap();
        assert_eq!(reloaded.resource, patched.resource);
    }

    #[tokio::test]
    async fn no_op_patch_leaves_version_and_meta_untouched() {
        let store = InMemoryStore::new();
        let registry = registry();
        let initial_version = store
            .store("User", "1", json!({"userName": "same"}))
            .await
            .unwrap();

        let request = PatchRequest::new(vec![PatchOperation::replace("userName", json!("same"))]);
        let patched = patch_resource(&store, &registry, "User", "1", &request)
            .await
            .unwrap();

        assert!(!patched.changed);
        assert_eq!(patched.version, initial_version);
        assert!(patched.resource.get("meta").is_none());
    }

    #[tokio::test]
    async fn missing_resource_reports_not_found() {
        let store = InMemoryStore::new();
        let registry = registry();
        let request = PatchRequest::new(vec![PatchOperation::replace("userName", json!("x"))]);
        let result = patch_resource(&store, &registry, "User", "missing", &request).await;
        assert!(matches!(result, Err(PatchApplyError::NotFound { .. })));
    }

    #[tokio::test]
    async fn failed_patch_leaves_store_untouched() {
        let store = InMemoryStore::new();
        let registry = registry();
        store
            .store("User", "1", json!({"userName": "u"}))
            .await
            .unwrap();

        let request = PatchRequest::new(vec![
            PatchOperation::replace("userName", json!("u2")),
            PatchOperation::replace("badAttr", json!("x")),
        ]);
        let result = patch_resource(&store, &registry, "User", "1", &request).await;
        assert!(matches!(result, Err(PatchApplyError::Scim(_))));

        let reloaded = store.load("User", "1").await.unwrap().unwrap();
        assert_eq!(reloaded.resource, json!({"userName": "u"}));
    }
}
