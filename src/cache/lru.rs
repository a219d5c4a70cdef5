//! Bounded, in-process cache tier backed by the `lru` crate: a fixed
//! capacity with least-recently-used eviction, no TTL.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::module::License;

use super::{Cache, CacheFuture};

pub struct LruCache {
    entries: Mutex<lru::LruCache<String, License>>,
}

impl LruCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(lru::LruCache::new(capacity)),
        }
    }
}

impl Cache for LruCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<License>> {
        let result = self
            .entries
            .lock()
            .map(|mut guard| guard.get(key).cloned())
            .map_err(|_| ValidationErrorPoisoned.into());
        Box::pin(async move { result })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        license: &'a License,
        _ttl: Option<std::time::Duration>,
    ) -> CacheFuture<'a, ()> {
        let result = self
            .entries
            .lock()
            .map(|mut guard| {
                guard.put(key.to_string(), license.clone());
            })
            .map_err(|_| ValidationErrorPoisoned.into());
        Box::pin(async move { result })
    }
}

/// A poisoned mutex means a prior access panicked mid-update; surfaced
/// as an upstream-shaped failure since there's no meaningful way for a
/// caller to recover the cache's contents.
struct ValidationErrorPoisoned;

impl From<ValidationErrorPoisoned> for crate::error::ValidationError {
    fn from(_: ValidationErrorPoisoned) -> Self {
        crate::error::ValidationError::upstream("lru cache lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evicts_oldest_entry_past_capacity() {
        let cache = LruCache::new(NonZeroUsize::new(1).unwrap());
        cache.put("a", &License::by_spdx_id("MIT"), None).await.unwrap();
        cache.put("b", &License::by_spdx_id("ISC"), None).await.unwrap();

        assert!(cache.get("a").await.unwrap().is_none());
        assert_eq!(cache.get("b").await.unwrap(), Some(License::by_spdx_id("ISC")));
    }
}
