use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

/// Names a loadable resource. Unique per resource and stable for the
/// lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ResourceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Caller-supplied identity registered against a cache entry, extending the
/// entry's lifetime. Owners are bookkeeping labels, not addresses;
/// registering the same owner twice is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(owner: impl Into<String>) -> Self {
        Self(owner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(owner: &str) -> Self {
        Self::new(owner)
    }
}

impl From<String> for OwnerId {
    fn from(owner: String) -> Self {
        Self(owner)
    }
}

/// A loaded binary resource as produced by the fetch collaborator.
#[derive(Debug, Clone)]
pub struct ResourceData {
    pub key: ResourceKey,
    pub bytes: Vec<u8>,
}

/// Shared handle to a cached resource. The backing data is freed once the
/// cache has evicted the entry and the last outstanding handle is dropped.
pub type ResourceHandle = Arc<ResourceData>;

/// The storage/network loader injected into the cache.
///
/// Invoked exactly once per cache miss; concurrent requests for the same key
/// all share that single call.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, key: &ResourceKey) -> anyhow::Result<ResourceData>;
}
