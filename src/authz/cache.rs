use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::models::permission::ResolvedPermissions;

/// Process-wide cache of resolved permissions, keyed by user id.
///
/// Every invalidation bumps an epoch. A resolve reads the epoch before going
/// to the database and only stores its result if no invalidation happened in
/// between, so a write racing with a read can never leave a stale entry.
///
/// Rows written by other processes sharing the database never reach
/// [`invalidate`](Self::invalidate), so entries also expire after `ttl`.
#[derive(Debug, Clone, Default)]
pub struct PermissionCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    entries: DashMap<i64, CachedEntry>,
    epoch: AtomicU64,
    ttl: Duration,
}

#[derive(Debug)]
struct CachedEntry {
    value: Arc<ResolvedPermissions>,
    cached_at: Instant,
}

impl Default for CacheInner {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            epoch: AtomicU64::new(0),
            ttl: PermissionCache::DEFAULT_TTL,
        }
    }
}

impl PermissionCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner { ttl, ..CacheInner::default() }),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }

    pub fn get(&self, user_id: i64) -> Option<Arc<ResolvedPermissions>> {
        let entry = self.inner.entries.get(&user_id)?;
        if entry.cached_at.elapsed() >= self.inner.ttl {
            drop(entry);
            self.inner.entries.remove(&user_id);
            return None;
        }
        Some(Arc::clone(&entry.value))
    }

    /// Stores `value` unless the cache was invalidated after `epoch` was read.
    pub fn insert_if_current(&self, epoch: u64, value: Arc<ResolvedPermissions>) -> bool {
        if self.epoch() != epoch {
            return false;
        }
        self.inner.entries.insert(
            value.user_id,
            CachedEntry { value, cached_at: Instant::now() },
        );
        // An invalidation may have landed between the check and the insert.
        if self.epoch() != epoch {
            self.inner.entries.clear();
            return false;
        }
        true
    }

    pub fn invalidate(&self, user_id: i64) {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        self.inner.entries.remove(&user_id);
        tracing::debug!(user_id, "permission cache entry invalidated");
    }

    pub fn invalidate_all(&self) {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        self.inner.entries.clear();
        tracing::debug!("permission cache cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}
