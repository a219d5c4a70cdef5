//! Fuzzy, confidence-scored license detection over a small virtual
//! filesystem contract, used by resolvers that only have raw file
//! content to go on (an archive's root, a repository's file listing)
//! rather than a registry API that names the license directly.

use std::future::Future;
use std::pin::Pin;

use crate::error::ValidationError;
use crate::module::License;

use super::ResolveFuture;

/// Boxed future returned by [`LicenseFiler`] methods, for the same
/// dyn-compatibility reason as [`super::ResolveFuture`].
pub type FilerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ValidationError>> + Send + 'a>>;

/// A minimal read-only filesystem: list a directory, read a file.
/// `path` is always relative to the resolver's notion of "root" (an
/// archive's top-level entry with its version prefix stripped, or a
/// repository's default branch root).
pub trait LicenseFiler: Send + Sync {
    fn read_file<'a>(&'a self, path: &'a str) -> FilerFuture<'a, Vec<u8>>;
    fn read_dir<'a>(&'a self, path: &'a str) -> FilerFuture<'a, Vec<String>>;
}

/// Scores file content against a license's candidate fuzzy result.
pub trait LicenseDetector: Send + Sync {
    fn detect<'a>(&'a self, filer: &'a dyn LicenseFiler) -> ResolveFuture<'a>;
}

/// File names, in priority order, that are checked for license text.
const CANDIDATE_NAMES: &[&str] = &[
    "LICENSE",
    "LICENSE.md",
    "LICENSE.txt",
    "LICENCE",
    "LICENCE.md",
    "LICENCE.txt",
    "COPYING",
    "COPYING.txt",
];

struct Signature {
    spdx_id: &'static str,
    keywords: &'static [&'static str],
}

const SIGNATURES: &[Signature] = &[
    Signature {
        spdx_id: "MIT",
        keywords: &["permission is hereby granted", "without restriction", "mit license"],
    },
    Signature {
        spdx_id: "Apache-2.0",
        keywords: &["apache license", "version 2.0", "www.apache.org/licenses/license-2.0"],
    },
    Signature {
        spdx_id: "BSD-3-Clause",
        keywords: &[
            "redistribution and use in source and binary forms",
            "neither the name",
        ],
    },
    Signature {
        spdx_id: "BSD-2-Clause",
        keywords: &["redistribution and use in source and binary forms"],
    },
    Signature {
        spdx_id: "ISC",
        keywords: &["permission to use, copy, modify, and/or distribute"],
    },
    Signature {
        spdx_id: "GPL-3.0-only",
        keywords: &["gnu general public license", "version 3"],
    },
    Signature {
        spdx_id: "GPL-2.0-only",
        keywords: &["gnu general public license", "version 2"],
    },
    Signature {
        spdx_id: "MPL-2.0",
        keywords: &["mozilla public license", "version 2.0"],
    },
    Signature {
        spdx_id: "AGPL-3.0-only",
        keywords: &["gnu affero general public license"],
    },
    Signature {
        spdx_id: "Unlicense",
        keywords: &["this is free and unencumbered software"],
    },
];

fn score(text: &str) -> Option<(&'static str, f32)> {
    let lower = text.to_lowercase();
    SIGNATURES
        .iter()
        .filter_map(|sig| {
            let matched = sig.keywords.iter().filter(|kw| lower.contains(*kw)).count();
            if matched == 0 {
                return None;
            }
            Some((sig.spdx_id, matched as f32 / sig.keywords.len() as f32))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Scans the root directory for a license file and scores its content
/// against a small table of well-known license signatures, returning the
/// highest-confidence match at or above `confidence_threshold`.
pub struct HeuristicDetector {
    pub confidence_threshold: f32,
}

impl HeuristicDetector {
    pub fn new(confidence_threshold: f32) -> Self {
        Self { confidence_threshold }
    }

    async fn detect_inner(&self, filer: &dyn LicenseFiler) -> Result<License, ValidationError> {
        let entries = filer.read_dir("").await?;
        let mut best: Option<(&'static str, f32)> = None;

        for candidate in CANDIDATE_NAMES {
            let Some(entry) = entries.iter().find(|e| e.eq_ignore_ascii_case(candidate)) else {
                continue;
            };
            let bytes = filer.read_file(entry).await?;
            let text = String::from_utf8_lossy(&bytes);
            if let Some((spdx_id, confidence)) = score(&text) {
                if best.is_none_or(|(_, best_confidence)| confidence > best_confidence) {
                    best = Some((spdx_id, confidence));
                }
            }
        }

        match best {
            Some((spdx_id, confidence)) if confidence >= self.confidence_threshold => {
                tracing::debug!(spdx_id, confidence, "heuristic license match");
                let name = crate::spdx::license_by_id(spdx_id).map(|info| info.name).unwrap_or_default();
                Ok(License::new(spdx_id, name))
            }
            _ => Err(ValidationError::UnknownLicense),
        }
    }
}

impl LicenseDetector for HeuristicDetector {
    fn detect<'a>(&'a self, filer: &'a dyn LicenseFiler) -> ResolveFuture<'a> {
        Box::pin(self.detect_inner(filer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeFiler {
        files: HashMap<String, Vec<u8>>,
    }

    impl LicenseFiler for FakeFiler {
        fn read_file<'a>(&'a self, path: &'a str) -> FilerFuture<'a, Vec<u8>> {
            let result = self
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| ValidationError::upstream(format!("no such file: {path}")));
            Box::pin(async move { result })
        }

        fn read_dir<'a>(&'a self, _path: &'a str) -> FilerFuture<'a, Vec<String>> {
            let names = self.files.keys().cloned().collect();
            Box::pin(async move { Ok(names) })
        }
    }

    #[tokio::test]
    async fn detects_mit_license_text() {
        let mut files = HashMap::new();
        files.insert(
            "LICENSE".to_string(),
            b"MIT License\n\nPermission is hereby granted, free of charge, \
              to any person obtaining a copy of this software, without restriction..."
                .to_vec(),
        );
        let filer = FakeFiler { files };
        let detector = HeuristicDetector::new(0.5);
        let license = detector.detect(&filer).await.unwrap();
        assert_eq!(license, License::by_spdx_id("MIT"));
    }

    #[tokio::test]
    async fn below_threshold_is_unknown() {
        let mut files = HashMap::new();
        files.insert("LICENSE".to_string(), b"some unrelated text".to_vec());
        let filer = FakeFiler { files };
        let detector = HeuristicDetector::new(0.5);
        let err = detector.detect(&filer).await.unwrap_err();
        assert!(matches!(err, ValidationError::UnknownLicense));
    }

    #[tokio::test]
    async fn missing_license_file_is_unknown() {
        let filer = FakeFiler { files: HashMap::new() };
        let detector = HeuristicDetector::new(0.5);
        let err = detector.detect(&filer).await.unwrap_err();
        assert!(matches!(err, ValidationError::UnknownLicense));
    }
}
