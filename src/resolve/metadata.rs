//! Resolves a license from a GitHub repository's metadata API, with a
//! fuzzy fallback when GitHub itself can't classify the license (its
//! API reports `"other"`/`NOASSERTION`).

use std::time::Duration;

use base64::Engine;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::ValidationError;
use crate::module::{License, Module};

use super::detector::{FilerFuture, LicenseDetector, LicenseFiler};
use super::{LicenseResolver, ResolveFuture};

const GITHUB_MODULE_PATTERN: &str = r"^github\.com/([^/]+)/([^/]+)$";

/// Mirrors the real shape of GitHub's `/repos/{owner}/{repo}/license`
/// response: the license metadata nested under `license`, plus the
/// matched license *file*'s own base64 content inlined at the top
/// level, so a single request is enough to run the fuzzy fallback over
/// its text when GitHub's own classification is inconclusive.
#[derive(Debug, Deserialize)]
struct LicenseResponse {
    license: Option<LicenseField>,
    content: Option<String>,
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LicenseField {
    key: String,
    name: String,
    spdx_id: Option<String>,
}

/// A single-file, in-memory [`LicenseFiler`] wrapping the license-file
/// content already present in a [`LicenseResponse`] — no extra request
/// needed to run the fuzzy detector.
struct InlineFiler {
    content: Vec<u8>,
}

impl LicenseFiler for InlineFiler {
    fn read_dir<'a>(&'a self, _path: &'a str) -> FilerFuture<'a, Vec<String>> {
        Box::pin(async { Ok(vec!["LICENSE".to_string()]) })
    }

    fn read_file<'a>(&'a self, path: &'a str) -> FilerFuture<'a, Vec<u8>> {
        let result = if path == "LICENSE" {
            Ok(self.content.clone())
        } else {
            Err(ValidationError::UnknownLicense)
        };
        Box::pin(async move { result })
    }
}

/// Resolves licenses via the GitHub REST API's per-repository license
/// endpoint, falling back to a [`LicenseDetector`] run over the
/// repository's root file listing when GitHub reports an unclassified
/// license.
pub struct MetadataResolver<D> {
    client: reqwest::Client,
    api_base: url::Url,
    token: Option<String>,
    cancellation: CancellationToken,
    detector: D,
    module_pattern: Regex,
}

impl<D: LicenseDetector> MetadataResolver<D> {
    pub fn new(
        client: reqwest::Client,
        api_base: url::Url,
        token: Option<String>,
        cancellation: CancellationToken,
        detector: D,
    ) -> Self {
        Self {
            client,
            api_base,
            token,
            cancellation,
            detector,
            module_pattern: Regex::new(GITHUB_MODULE_PATTERN).expect("static github module pattern is valid"),
        }
    }

    fn request(&self, owner: &str, repo: &str) -> reqwest::RequestBuilder {
        let url = self
            .api_base
            .join(&format!("repos/{owner}/{repo}/license"))
            .expect("license URL is well-formed");
        let mut builder = self.client.get(url).header("User-Agent", "license-admission-webhook");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Waits out a GitHub rate-limit window, then retries the same
    /// request. A `Reset` header in the past is treated as "wait nothing".
    /// The wait races the resolver's cancellation token, the same
    /// suspend-and-resume shape as a `select!` over a timer and a done
    /// channel.
    async fn wait_for_reset(&self, reset_unix: u64) -> Result<(), ValidationError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let wait = Duration::from_secs(reset_unix.saturating_sub(now));
        tokio::select! {
            _ = tokio::time::sleep(wait) => Ok(()),
            _ = self.cancellation.cancelled() => Err(ValidationError::Cancelled),
        }
    }

    async fn resolve(&self, module: &Module) -> Result<License, ValidationError> {
        let Some(caps) = self.module_pattern.captures(&module.name) else {
            return Err(ValidationError::UnknownLicense);
        };
        let owner = caps[1].to_string();
        let repo = caps[2].to_string();

        loop {
            let response = self.request(&owner, &repo).send().await?;

            let rate_limited = response.status() == StatusCode::FORBIDDEN
                && response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    == Some("0");

            if rate_limited {
                let reset: u64 = response
                    .headers()
                    .get("x-ratelimit-reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                tracing::warn!(module = %module, reset, "github rate limit hit, waiting");
                self.wait_for_reset(reset).await?;
                continue;
            }

            if !response.status().is_success() {
                return Err(ValidationError::upstream(format!(
                    "github api returned {}",
                    response.status()
                )));
            }

            let body: LicenseResponse = response.json().await?;
            let Some(license) = body.license else {
                return Err(ValidationError::UnknownLicense);
            };

            let unclassified = license.key == "other"
                || license.spdx_id.as_deref().is_none_or(|id| id == "NOASSERTION");

            if !unclassified {
                let spdx_id = license.spdx_id.unwrap_or_default();
                return Ok(License::new(spdx_id, license.name));
            }

            tracing::debug!(module = %module, "github license unclassified, falling back to detector");
            let (Some(content), Some(encoding)) = (body.content, body.encoding) else {
                return Err(ValidationError::UnknownLicense);
            };
            if encoding != "base64" {
                return Err(ValidationError::upstream(format!(
                    "unsupported license content encoding: {encoding}"
                )));
            }
            let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(cleaned)
                .map_err(|e| ValidationError::upstream(format!("invalid base64 license content: {e}")))?;
            let filer = InlineFiler { content: decoded };
            return self.detector.detect(&filer).await;
        }
    }
}

impl<D: LicenseDetector> LicenseResolver for MetadataResolver<D> {
    fn resolve_license<'a>(&'a self, module: &'a Module) -> ResolveFuture<'a> {
        Box::pin(self.resolve(module))
    }
}
