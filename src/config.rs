//! Configuration for the admission webhook.
//!
//! Loaded once at startup from a TOML file. Every struct derives
//! `Default` and uses `#[serde(default)]` so a deployer's config only
//! needs to mention the fields it wants to override, the same
//! partial-config convention the LSP side of this crate's ancestry used
//! for editor-supplied settings.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth;
use crate::validate::UnknownLicenseAction;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Enables verbose (`debug`) logging in place of `info`.
    pub debug: bool,
    pub cache: CacheConfig,
    pub github: GithubConfig,
    pub go_proxy: GoProxyConfig,
    /// User-configured name rewrites, tried before the built-in
    /// translators, first match wins.
    pub path_overrides: Vec<PathOverride>,
    pub validation: ValidationConfig,
    pub webhook: Option<WebhookConfig>,
    pub server: ServerConfig,
    /// Accepted for forward compatibility; wiring an actual trace
    /// exporter is out of scope, a present section only logs a warning.
    pub trace: Option<TraceConfig>,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, crate::error::ValidationError> {
        toml::from_str(s).map_err(|e| crate::error::ValidationError::config(format!("invalid config: {e}")))
    }

    pub fn sample() -> Self {
        Self {
            debug: false,
            cache: CacheConfig {
                kind: CacheKind::Memory,
                size_items: 10_000,
                kv: Some(KvConfig {
                    addrs: vec!["localhost:6379".to_string()],
                    db: 0,
                    password: Some(Secret("password".to_string())),
                    pool_size: 10,
                    connect_timeout_secs: Some(5),
                    read_timeout_secs: Some(5),
                    write_timeout_secs: Some(5),
                }),
                ttl_secs: Some(86_400),
            },
            github: GithubConfig {
                access_token: Some(Secret("ghp_xxxxxxxxxxxxxxxxxxxx".to_string())),
                api_base_url: "https://api.github.com/".to_string(),
            },
            go_proxy: GoProxyConfig {
                base_url: "https://proxy.golang.org/".to_string(),
            },
            path_overrides: vec![PathOverride {
                name_match: "^private\\.example\\.com/(.+)$".to_string(),
                replace: "github.com/acme/$1".to_string(),
            }],
            validation: ValidationConfig {
                unknown_license_action: UnknownLicenseAction::Warn,
                confidence_threshold: 0.9,
                rule_set: RuleSetConfig {
                    whitelisted_modules: vec![],
                    blacklisted_modules: vec![ModuleMatcherConfig {
                        name: "^github.com/evilcorp/.*$".to_string(),
                        version_constraint: None,
                    }],
                    allowed_licenses: vec![],
                    denied_licenses: vec![LicenseConfig {
                        spdx_id: "AGPL-3.0-only".to_string(),
                        name: String::new(),
                    }],
                },
            },
            webhook: Some(WebhookConfig {
                url: "https://example.com/license-hook".to_string(),
                method: "POST".to_string(),
                body_template: r#"{"module":"{{module}}","version":"{{version}}"}"#.to_string(),
                headers: HashMap::from([("Authorization".to_string(), Secret("Bearer xxxxxxxx".to_string()))]),
            }),
            server: ServerConfig::default(),
            trace: None,
        }
    }
}

/// A secret string. `Debug` and `Display` redact it; the plaintext is
/// only reachable via [`Secret::expose`].
#[derive(Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", auth::redact(&self.0))
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", auth::redact(&self.0))
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    None,
    #[default]
    Memory,
    #[serde(rename = "memlru")]
    Lru,
    #[serde(rename = "redis")]
    Kv,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    pub kind: CacheKind,
    /// Capacity for [`CacheKind::Lru`]; ignored otherwise.
    pub size_items: usize,
    /// Required for [`CacheKind::Kv`]; ignored otherwise.
    pub kv: Option<KvConfig>,
    /// TTL applied to cache writes. `None` means entries never expire
    /// (always true for [`CacheKind::Memory`] and [`CacheKind::Lru`],
    /// which have no expiry mechanism at all).
    pub ttl_secs: Option<u64>,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KvConfig {
    /// `host:port` entries. This tier only ever speaks to a single node
    /// (the first entry); additional entries are accepted for config-shape
    /// parity with a Redis Cluster/Sentinel deployment but are not wired
    /// up to per-key hashing.
    pub addrs: Vec<String>,
    pub db: i64,
    pub password: Option<Secret>,
    /// Connection pool size. `redis`'s `ConnectionManager` multiplexes a
    /// single connection rather than pooling several, so this is accepted
    /// for parity with the wire-protocol config shape but not enforced.
    pub pool_size: u32,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            addrs: vec!["127.0.0.1:6379".to_string()],
            db: 0,
            password: None,
            pool_size: 10,
            connect_timeout_secs: None,
            read_timeout_secs: None,
            write_timeout_secs: None,
        }
    }
}

impl fmt::Debug for KvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvConfig")
            .field("addrs", &self.addrs)
            .field("db", &self.db)
            .field("password", &self.password)
            .field("pool_size", &self.pool_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("write_timeout_secs", &self.write_timeout_secs)
            .finish()
    }
}

impl KvConfig {
    /// Builds a `redis://[:password@]host:port/db` connection URL from the
    /// first configured address.
    pub fn connection_url(&self) -> Result<String, crate::error::ValidationError> {
        let addr = self
            .addrs
            .first()
            .ok_or_else(|| crate::error::ValidationError::config("cache.kv.addrs must not be empty"))?;
        let auth = self
            .password
            .as_ref()
            .map(|p| format!(":{}@", p.expose()))
            .unwrap_or_default();
        Ok(format!("redis://{auth}{addr}/{}", self.db))
    }
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GithubConfig {
    pub access_token: Option<Secret>,
    pub api_base_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base_url: "https://api.github.com/".to_string(),
        }
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("access_token", &self.access_token)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GoProxyConfig {
    pub base_url: String,
}

impl Default for GoProxyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://proxy.golang.org/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathOverride {
    #[serde(rename = "match")]
    pub name_match: String,
    pub replace: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleMatcherConfig {
    pub name: String,
    pub version_constraint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LicenseConfig {
    #[serde(default)]
    pub spdx_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuleSetConfig {
    pub whitelisted_modules: Vec<ModuleMatcherConfig>,
    pub blacklisted_modules: Vec<ModuleMatcherConfig>,
    pub allowed_licenses: Vec<LicenseConfig>,
    pub denied_licenses: Vec<LicenseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub unknown_license_action: UnknownLicenseAction,
    /// Minimum score (0.0-1.0) the fuzzy detector requires before
    /// trusting a license-text match.
    pub confidence_threshold: f32,
    pub rule_set: RuleSetConfig,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            unknown_license_action: UnknownLicenseAction::default(),
            confidence_threshold: 0.9,
            rule_set: RuleSetConfig::default(),
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: String,
    /// HTTP method used to deliver the notification. Defaults to `POST`.
    pub method: String,
    pub body_template: String,
    /// Extra headers sent with the webhook request (e.g. `Authorization`).
    /// Values are redacted on `Debug` print regardless of header name.
    pub headers: HashMap<String, Secret>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "POST".to_string(),
            body_template: r#"{"module":"{{module}}","version":"{{version}}"}"#.to_string(),
            headers: HashMap::new(),
        }
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("body_template", &self.body_template)
            .field("headers", &self.headers)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Accepted for parity with the original's config shape; this repo
    /// exposes no pprof endpoint, so enabling it only logs a warning.
    pub enable_pprof: bool,
    /// Hosts (no port) that must never appear as the caller's peer
    /// address or `Host` header — a misconfiguration guard against a
    /// proxy routing its own admission-webhook calls back at itself.
    pub forbidden_hosts: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            enable_pprof: false,
            forbidden_hosts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TraceConfig {
    pub endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_listen_addr() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.cache.kind, CacheKind::Memory);
    }

    #[test]
    fn parses_partial_toml() {
        let toml = r#"
            [server]
            listen_addr = "127.0.0.1:9090"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9090");
        assert_eq!(config.cache.kind, CacheKind::Memory);
    }

    #[test]
    fn parses_full_validation_section() {
        let toml = r#"
            [validation]
            unknown_license_action = "deny"
            confidence_threshold = 0.75

            [[validation.rule_set.blacklisted_modules]]
            name = "^github.com/evilcorp/.*$"

            [[validation.rule_set.denied_licenses]]
            spdx_id = "GPL-3.0-only"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.validation.unknown_license_action, UnknownLicenseAction::Deny);
        assert_eq!(config.validation.rule_set.blacklisted_modules.len(), 1);
        assert_eq!(config.validation.rule_set.denied_licenses[0].spdx_id, "GPL-3.0-only");
    }

    #[test]
    fn debug_redacts_github_token() {
        let config = GithubConfig {
            access_token: Some(Secret("ghp_supersecretvalue".to_string())),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("supersecretvalue"));
        assert!(debug.contains("ghp_..."));
    }

    #[test]
    fn debug_redacts_kv_password() {
        let kv = KvConfig {
            password: Some(Secret("hunter2".to_string())),
            ..Default::default()
        };
        let debug = format!("{kv:?}");
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn kv_connection_url_embeds_password_and_db() {
        let kv = KvConfig {
            addrs: vec!["localhost:6379".to_string()],
            db: 2,
            password: Some(Secret("hunter2".to_string())),
            ..Default::default()
        };
        assert_eq!(kv.connection_url().unwrap(), "redis://:hunter2@localhost:6379/2");
    }

    #[test]
    fn kv_connection_url_requires_at_least_one_addr() {
        let kv = KvConfig {
            addrs: vec![],
            ..Default::default()
        };
        assert!(kv.connection_url().is_err());
    }

    #[test]
    fn debug_redacts_webhook_headers() {
        let webhook = WebhookConfig {
            headers: HashMap::from([("Authorization".to_string(), Secret("Bearer sekrit".to_string()))]),
            ..Default::default()
        };
        let debug = format!("{webhook:?}");
        assert!(!debug.contains("sekrit"));
    }

    #[test]
    fn sample_round_trips_through_toml() {
        let sample = Config::sample();
        let rendered = toml::to_string_pretty(&sample).unwrap();
        let parsed = Config::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed.go_proxy.base_url, sample.go_proxy.base_url);
    }
}
