//! Reference-counted resource cache with in-flight request deduplication.
//!
//! The cache hands out shared handles to loaded resources, keyed by
//! [`ResourceKey`]. Consumers register an [`OwnerId`] when acquiring and the
//! backing resource is released the instant the last owner detaches.
//! Concurrent acquisitions of a key that is still loading all wait on the
//! same fetch; at most one fetch is ever in flight per key.

mod fetch;

pub use fetch::{OwnerId, ResourceData, ResourceFetcher, ResourceHandle, ResourceKey};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use log::{debug, error, info};
use tokio::sync::watch;

use crate::error::CacheError;

type LoadResult = Result<ResourceHandle, CacheError>;

enum Entry {
    /// A fetch is in flight; waiters subscribe to the channel and register
    /// themselves once it resolves.
    Pending { done: watch::Receiver<Option<LoadResult>> },

    /// Loaded and owned.
    Ready {
        handle: ResourceHandle,
        owners: HashSet<OwnerId>,
    },
}

/// What an `acquire` call decided to do while the table lock was held.
enum AcquirePlan {
    Hit(ResourceHandle),
    Wait(watch::Receiver<Option<LoadResult>>),
    Fetch(watch::Sender<Option<LoadResult>>),
}

struct CacheInner {
    entries: HashMap<ResourceKey, Entry>,
    preload_groups: HashMap<OwnerId, Vec<ResourceKey>>,
    fetches_started: u64,
    fetches_failed: u64,
}

/// Snapshot of cache bookkeeping counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Loaded entries currently in the table
    pub entries: usize,
    /// Entries with a fetch still in flight
    pub pending: usize,
    /// Total fetches handed to the fetch collaborator
    pub fetches_started: u64,
    /// Fetches that resolved with an error
    pub fetches_failed: u64,
}

/// Keyed store of loaded resources with owner bookkeeping and load
/// deduplication.
///
/// All table mutations happen under one lock that is never held across an
/// await point; waiting on an in-flight load is done on a watch channel
/// outside the lock, so owner counts can never be observed mid-mutation.
pub struct ResourceCache {
    fetcher: Arc<dyn ResourceFetcher>,
    inner: Mutex<CacheInner>,
}

impl ResourceCache {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                preload_groups: HashMap::new(),
                fetches_started: 0,
                fetches_failed: 0,
            }),
        }
    }

    /// Hand out a handle for `key`, registering `owner` against the entry.
    ///
    /// A loaded entry resolves immediately with no await. If another load
    /// for the key is already in flight, this waits for that same load
    /// rather than starting a second fetch. A miss invokes the fetch
    /// collaborator; on failure the entry is removed and
    /// [`CacheError::FetchFailed`] is returned to every waiter.
    pub async fn acquire(
        &self,
        key: &ResourceKey,
        owner: &OwnerId,
    ) -> Result<ResourceHandle, CacheError> {
        loop {
            let plan = {
                let mut inner = self.inner.lock().unwrap();
                match inner.entries.get_mut(key) {
                    Some(Entry::Ready { handle, owners }) => {
                        owners.insert(owner.clone());
                        debug!("cache hit for `{}`, registered owner `{}`", key, owner);
                        AcquirePlan::Hit(handle.clone())
                    }
                    Some(Entry::Pending { done }) => AcquirePlan::Wait(done.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        inner
                            .entries
                            .insert(key.clone(), Entry::Pending { done: rx });
                        inner.fetches_started += 1;
                        AcquirePlan::Fetch(tx)
                    }
                }
            };

            match plan {
                AcquirePlan::Hit(handle) => return Ok(handle),
                AcquirePlan::Fetch(tx) => return self.fetch_and_store(key, owner, tx).await,
                AcquirePlan::Wait(rx) => match self.join_pending(key, owner, rx).await {
                    Some(result) => return result,
                    // The load we waited on was superseded by a newer one;
                    // go around and join that generation so the owner ends
                    // up registered against the live entry.
                    None => continue,
                },
            }
        }
    }

    /// Remove `owner` from the entry for `key`. When the owner set empties,
    /// the entry is evicted and the backing resource released. Unknown keys
    /// and unregistered owners are tolerated no-ops.
    pub fn release(&self, key: &ResourceKey, owner: &OwnerId) {
        let mut inner = self.inner.lock().unwrap();
        let Some(Entry::Ready { owners, .. }) = inner.entries.get_mut(key) else {
            return;
        };
        if !owners.remove(owner) {
            return;
        }
        if owners.is_empty() {
            inner.entries.remove(key);
            debug!("last owner of `{}` released, evicting", key);
        }
    }

    /// Acquire every key in `keys` under `group` as a single logical owner,
    /// loading concurrently. Every started load runs to completion and
    /// registers normally; if any failed, the first failure in key order is
    /// returned once all are done.
    pub async fn preload_batch(
        &self,
        group: impl Into<OwnerId>,
        keys: &[ResourceKey],
    ) -> Result<(), CacheError> {
        let group = group.into();
        {
            let mut inner = self.inner.lock().unwrap();
            let recorded = inner.preload_groups.entry(group.clone()).or_default();
            for key in keys {
                if !recorded.contains(key) {
                    recorded.push(key.clone());
                }
            }
        }

        info!("preloading {} resources for group `{}`", keys.len(), group);
        let results = join_all(keys.iter().map(|key| self.acquire(key, &group))).await;
        for result in results {
            result?;
        }
        Ok(())
    }

    /// Release `group`'s ownership of every key it preloaded. Unknown
    /// groups are a no-op.
    pub fn release_preload_batch(&self, group: impl Into<OwnerId>) {
        let group = group.into();
        let keys = {
            let mut inner = self.inner.lock().unwrap();
            inner.preload_groups.remove(&group)
        };
        let Some(keys) = keys else { return };
        debug!("releasing preload group `{}` ({} keys)", group, keys.len());
        for key in &keys {
            self.release(key, &group);
        }
    }

    /// Non-blocking lookup. Returns nothing while absent or still loading
    /// and never triggers a load or registers ownership.
    pub fn try_peek(&self, key: &ResourceKey) -> Option<ResourceHandle> {
        let inner = self.inner.lock().unwrap();
        match inner.entries.get(key) {
            Some(Entry::Ready { handle, .. }) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Current bookkeeping counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        let pending = inner
            .entries
            .values()
            .filter(|entry| matches!(entry, Entry::Pending { .. }))
            .count();
        CacheStats {
            entries: inner.entries.len(),
            pending,
            fetches_started: inner.fetches_started,
            fetches_failed: inner.fetches_failed,
        }
    }

    /// Wait on another caller's in-flight load and register afterwards.
    /// Returns `None` when that load's entry was evicted and replaced by a
    /// newer in-flight load before we woke; the caller rejoins the new one.
    async fn join_pending(
        &self,
        key: &ResourceKey,
        owner: &OwnerId,
        mut rx: watch::Receiver<Option<LoadResult>>,
    ) -> Option<Result<ResourceHandle, CacheError>> {
        let outcome = match rx.wait_for(|result| result.is_some()).await {
            Ok(result) => result.clone(),
            Err(_) => None,
        };

        match outcome {
            Some(Ok(handle)) => {
                let mut inner = self.inner.lock().unwrap();
                match inner.entries.get_mut(key) {
                    Some(Entry::Ready { handle, owners }) => {
                        owners.insert(owner.clone());
                        Some(Ok(handle.clone()))
                    }
                    None => {
                        // Every owner from the shared load released before we
                        // woke; re-admit the still-live resource rather than
                        // refetching.
                        let mut owners = HashSet::new();
                        owners.insert(owner.clone());
                        inner.entries.insert(
                            key.clone(),
                            Entry::Ready {
                                handle: handle.clone(),
                                owners,
                            },
                        );
                        Some(Ok(handle))
                    }
                    Some(Entry::Pending { .. }) => {
                        // A newer load generation raced our wakeup; drop the
                        // stale handle and join the live load instead.
                        debug!("re-load of `{}` raced a waiter, rejoining the new load", key);
                        None
                    }
                }
            }
            Some(Err(err)) => Some(Err(err)),
            None => {
                // The loading caller was dropped before resolving.
                let mut inner = self.inner.lock().unwrap();
                let ours = matches!(
                    inner.entries.get(key),
                    Some(Entry::Pending { done }) if done.same_channel(&rx)
                );
                if ours {
                    inner.entries.remove(key);
                } else if inner.entries.contains_key(key) {
                    // A different generation owns the slot now; rejoin it
                    return None;
                }
                Some(Err(CacheError::FetchFailed {
                    key: key.clone(),
                    message: "load dropped before completion".into(),
                }))
            }
        }
    }

    /// Run the single fetch for a miss and publish the outcome to waiters.
    async fn fetch_and_store(
        &self,
        key: &ResourceKey,
        owner: &OwnerId,
        tx: watch::Sender<Option<LoadResult>>,
    ) -> Result<ResourceHandle, CacheError> {
        match self.fetcher.fetch(key).await {
            Ok(data) => {
                let handle: ResourceHandle = Arc::new(data);
                {
                    let mut inner = self.inner.lock().unwrap();
                    let mut owners = HashSet::new();
                    owners.insert(owner.clone());
                    inner.entries.insert(
                        key.clone(),
                        Entry::Ready {
                            handle: handle.clone(),
                            owners,
                        },
                    );
                }
                info!("loaded resource `{}`", key);
                let _ = tx.send(Some(Ok(handle.clone())));
                Ok(handle)
            }
            Err(err) => {
                let failure = CacheError::FetchFailed {
                    key: key.clone(),
                    message: format!("{err:#}"),
                };
                {
                    let mut inner = self.inner.lock().unwrap();
                    inner.entries.remove(key);
                    inner.fetches_failed += 1;
                }
                error!("failed to load resource `{}`: {err:#}", key);
                let _ = tx.send(Some(Err(failure.clone())));
                Err(failure)
            }
        }
    }
}
