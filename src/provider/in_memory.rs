//! In-memory resource store.
//!
//! A thread-safe store keyed by `(resource type, id)`, intended for tests,
//! examples, and small deployments. Production hosts implement
//! [`ResourceStore`](super::ResourceStore) over their own persistence.

use super::version::ResourceVersion;
use super::{ResourceStore, VersionedResource};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Errors produced by the in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryStoreError {
    #[error("resource data must be a JSON object")]
    InvalidData,
}

/// Thread-safe in-memory resource store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    resources: RwLock<HashMap<(String, String), Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored resources across all types.
    pub async fn resource_count(&self) -> usize {
        self.resources.read().await.len()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    type Error = InMemoryStoreError;

    async fn load(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<VersionedResource>, Self::Error> {
        let resources = self.resources.read().await;
        Ok(resources
            .get(&(resource_type.to_string(), id.to_string()))
            .map(|resource| VersionedResource {
                version: ResourceVersion::of_resource(resource),
                resource: resource.clone(),
            }))
    }

    async fn store(
        &self,
        resource_type: &str,
        id: &str,
        resource: Value,
    ) -> Result<ResourceVersion, Self::Error> {
        if !resource.is_object() {
            return Err(InMemoryStoreError::InvalidData);
        }
        let version = ResourceVersion::of_resource(&resource);
        let mut resources = self.resources.write().await;
        resources.insert((resource_type.to_string(), id.to_string()), resource);
        Ok(version)
    }
}
