//! Core data model: modules, versions, and licenses.

use std::fmt;

/// A module version.
///
/// Wraps a parsed [`semver::Version`] alongside the original textual form
/// (e.g. a leading `v` as used by Go modules), which is preserved because
/// it is part of the cache-key derivation and of the archive download URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    original: String,
    parsed: semver::Version,
}

/// Error returned when a version string does not follow semver rules.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid version {0:?}: {1}")]
pub struct VersionParseError(String, String);

impl Version {
    /// Parse a version string, tolerating a leading `v` (Go module style).
    pub fn parse(original: &str) -> Result<Self, VersionParseError> {
        let stripped = original.strip_prefix('v').unwrap_or(original);
        let parsed = semver::Version::parse(stripped)
            .map_err(|e| VersionParseError(original.to_string(), e.to_string()))?;
        Ok(Self {
            original: original.to_string(),
            parsed,
        })
    }

    /// The original textual form as supplied by the caller, including any
    /// leading `v` or other user-provided formatting.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The parsed semver value, usable for range/constraint checks.
    pub fn semver(&self) -> &semver::Version {
        &self.parsed
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// A named, versioned module fetched by the module proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Module {
    pub name: String,
    pub version: Version,
}

impl Module {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Return a copy of this module with a different name, keeping the
    /// version. Used by translators, which only ever rewrite the name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: self.version.clone(),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Module<name: {}, version: {}>", self.name, self.version)
    }
}

/// A software license, identified by SPDX id and/or a human-readable name.
///
/// If both sides have a non-empty SPDX id, equality compares by id;
/// otherwise it compares by name. A value with both fields
/// empty denotes the unknown license and must never be the payload of a
/// successful resolution.
#[derive(Debug, Clone, Default, Eq)]
pub struct License {
    pub spdx_id: String,
    pub name: String,
}

impl License {
    pub fn new(spdx_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            spdx_id: spdx_id.into(),
            name: name.into(),
        }
    }

    pub fn by_spdx_id(spdx_id: impl Into<String>) -> Self {
        Self {
            spdx_id: spdx_id.into(),
            name: String::new(),
        }
    }

    /// True for the zero value: no SPDX id and no name.
    pub fn is_unknown(&self) -> bool {
        self.spdx_id.is_empty() && self.name.is_empty()
    }
}

impl PartialEq for License {
    fn eq(&self, other: &Self) -> bool {
        if !self.spdx_id.is_empty() && !other.spdx_id.is_empty() {
            self.spdx_id == other.spdx_id
        } else {
            self.name == other.name
        }
    }
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            f.write_str("<unknown license>")
        } else {
            write!(f, "License<name: {}, spdx: {}>", self.name, self.spdx_id)
        }
    }
}

/// A module paired with its resolved license; evaluator input and error
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensedModule {
    pub module: Module,
    pub license: License,
}

impl fmt::Display for LicensedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LicensedModule<module: {}, license: {}>", self.module, self.license)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn version_preserves_original_text() {
        let version = v("v1.5.1");
        assert_eq!(version.original(), "v1.5.1");
        assert_eq!(version.semver(), &semver::Version::new(1, 5, 1));
    }

    #[test]
    fn version_without_v_prefix() {
        let version = v("2.3.4");
        assert_eq!(version.original(), "2.3.4");
    }

    #[test]
    fn invalid_version_is_rejected() {
        assert!(Version::parse("not-a-version").is_err());
    }

    #[test]
    fn license_equality_by_spdx_id() {
        let a = License::new("MIT", "X");
        let b = License::new("MIT", "Y");
        assert_eq!(a, b);
    }

    #[test]
    fn license_equality_by_name_when_no_spdx() {
        let a = License {
            spdx_id: String::new(),
            name: "X".to_string(),
        };
        let b = License {
            spdx_id: String::new(),
            name: "X".to_string(),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn license_inequality_by_spdx_id() {
        let a = License::by_spdx_id("MIT");
        let b = License::by_spdx_id("BSD-3-Clause");
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_license_is_zero_value() {
        assert!(License::default().is_unknown());
        assert!(!License::new("MIT", "MIT License").is_unknown());
    }
}
