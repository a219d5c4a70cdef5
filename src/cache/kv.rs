//! Out-of-process cache tier backed by a Redis-protocol key/value store:
//! keys are namespaced, values are stored as a hash so a miss is "no
//! hash fields", not "key holds an empty string".

use redis::AsyncCommands;
use std::time::Duration;

use crate::module::License;

use super::{Cache, CacheFuture};

const KEY_PREFIX: &str = "license-admission-webhook:";

/// Caches resolved licenses in a Redis-protocol store via a pooled,
/// auto-reconnecting connection manager.
pub struct KvCache {
    manager: redis::aio::ConnectionManager,
}

impl KvCache {
    pub async fn connect(url: &str) -> Result<Self, crate::error::ValidationError> {
        let client = redis::Client::open(url)
            .map_err(|e| crate::error::ValidationError::config(format!("invalid kv cache URL: {e}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| crate::error::ValidationError::upstream(format!("kv cache connect failed: {e}")))?;
        Ok(Self { manager })
    }

    fn namespaced(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

impl Cache for KvCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<License>> {
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let fields: std::collections::HashMap<String, String> = conn
                .hgetall(Self::namespaced(key))
                .await
                .map_err(|e| crate::error::ValidationError::upstream(format!("kv cache get failed: {e}")))?;

            if fields.is_empty() {
                return Ok(None);
            }

            Ok(Some(License {
                spdx_id: fields.get("SPDXID").cloned().unwrap_or_default(),
                name: fields.get("Name").cloned().unwrap_or_default(),
            }))
        })
    }

    fn put<'a>(&'a self, key: &'a str, license: &'a License, ttl: Option<Duration>) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let namespaced = Self::namespaced(key);

            let _: () = conn
                .hset_multiple(
                    &namespaced,
                    &[("SPDXID", license.spdx_id.as_str()), ("Name", license.name.as_str())],
                )
                .await
                .map_err(|e| crate::error::ValidationError::upstream(format!("kv cache put failed: {e}")))?;

            if let Some(ttl) = ttl {
                let _: () = conn
                    .pexpire(&namespaced, ttl.as_millis() as i64)
                    .await
                    .map_err(|e| crate::error::ValidationError::upstream(format!("kv cache expire failed: {e}")))?;
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_keys() {
        assert_eq!(
            KvCache::namespaced("license:github.com/foo/bar@1.0.0"),
            "license-admission-webhook:license:github.com/foo/bar@1.0.0"
        );
    }
}
