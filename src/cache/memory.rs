//! Unbounded, process-local cache tier, generalizing the teacher's
//! `DashMap`-backed `MemoryCache` from version-info lookups to license
//! lookups. Entries never expire or evict on their own.

use dashmap::DashMap;

use crate::module::License;

use super::{Cache, CacheFuture};

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, License>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<License>> {
        let result = Ok(self.entries.get(key).map(|e| e.clone()));
        Box::pin(async move { result })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        license: &'a License,
        _ttl: Option<std::time::Duration>,
    ) -> CacheFuture<'a, ()> {
        self.entries.insert(key.to_string(), license.clone());
        Box::pin(async { Ok(()) })
    }
}
