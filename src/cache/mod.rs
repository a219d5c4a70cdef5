//! Caches license lookups in front of a [`LicenseResolver`]. At most one
//! cache tier wraps the configured resolver chain; the three tiers
//! ([`memory::MemoryCache`], [`lru::LruCache`], [`kv::KvCache`]) are
//! alternatives selected by configuration, not composed together.

pub mod kv;
pub mod lru;
pub mod memory;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::ValidationError;
use crate::module::{License, Module};
use crate::resolve::{LicenseResolver, ResolveFuture};

/// Boxed future returned by [`Cache`] methods, for the same
/// dyn-compatibility reason as [`crate::resolve::ResolveFuture`].
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ValidationError>> + Send + 'a>>;

/// Cache entries expire after this long when a tier supports TTLs and
/// none is configured explicitly.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// Cache key for a module: `license:<name>@<version>`, matching the key
/// shape the out-of-process KV tier has always used on the wire.
pub fn cache_key(module: &Module) -> String {
    format!("license:{}@{}", module.name, module.version.original())
}

/// A key/value store for resolved licenses.
pub trait Cache: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<License>>;
    fn put<'a>(&'a self, key: &'a str, license: &'a License, ttl: Option<Duration>) -> CacheFuture<'a, ()>;
}

/// Wraps a [`LicenseResolver`] with a [`Cache`]: a lookup first checks
/// the cache, falling back to the inner resolver on a miss and writing
/// the result back before returning it.
pub struct CachingResolver<C, R> {
    cache: C,
    inner: R,
    ttl: Option<Duration>,
}

impl<C: Cache, R: LicenseResolver> CachingResolver<C, R> {
    pub fn new(cache: C, inner: R, ttl: Option<Duration>) -> Self {
        Self { cache, inner, ttl }
    }

    async fn resolve(&self, module: &Module) -> Result<License, ValidationError> {
        let key = cache_key(module);

        if let Some(license) = self.cache.get(&key).await? {
            tracing::debug!(module = %module, "cache hit");
            return Ok(license);
        }

        let license = self.inner.resolve_license(module).await?;
        self.cache.put(&key, &license, self.ttl).await?;
        Ok(license)
    }
}

impl<C: Cache, R: LicenseResolver> LicenseResolver for CachingResolver<C, R> {
    fn resolve_license<'a>(&'a self, module: &'a Module) -> ResolveFuture<'a> {
        Box::pin(self.resolve(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Version;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingResolver {
        calls: Arc<AtomicUsize>,
    }

    impl LicenseResolver for CountingResolver {
        fn resolve_license<'a>(&'a self, _module: &'a Module) -> ResolveFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(License::by_spdx_id("MIT")) })
        }
    }

    #[tokio::test]
    async fn second_lookup_hits_cache_without_calling_inner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = CachingResolver::new(
            memory::MemoryCache::new(),
            CountingResolver { calls: calls.clone() },
            None,
        );
        let module = Module::new("github.com/foo/bar", Version::parse("1.0.0").unwrap());

        resolver.resolve_license(&module).await.unwrap();
        resolver.resolve_license(&module).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
