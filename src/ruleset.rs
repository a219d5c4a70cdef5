//! Rule-set evaluation: name/version matchers plus an allow/deny
//! precedence chain over resolved licenses.

use std::fmt;

use regex::Regex;
use semver::VersionReq;

use crate::error::ValidationError;
use crate::module::{License, Module};

/// Matches a module by name (regex) and, optionally, by a version
/// constraint. Used for both the whitelist and the blacklist.
#[derive(Debug, Clone)]
pub struct ModuleMatcher {
    name_source: String,
    name: Regex,
    version: Option<VersionReq>,
}

impl ModuleMatcher {
    pub fn new(name_pattern: &str, version_constraint: Option<&str>) -> Result<Self, ValidationError> {
        let name = Regex::new(name_pattern)
            .map_err(|e| ValidationError::config(format!("invalid module matcher {name_pattern:?}: {e}")))?;
        let version = version_constraint
            .map(VersionReq::parse)
            .transpose()
            .map_err(|e| ValidationError::config(format!("invalid version constraint: {e}")))?;
        Ok(Self {
            name_source: name_pattern.to_string(),
            name,
            version,
        })
    }

    /// True if `module`'s name matches the pattern, and, when a version
    /// constraint is present, its version also satisfies it.
    pub fn matches(&self, module: &Module) -> bool {
        if !self.name.is_match(&module.name) {
            return false;
        }
        match &self.version {
            Some(req) => req.matches(module.version.semver()),
            None => true,
        }
    }
}

impl fmt::Display for ModuleMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name_source)
    }
}

impl PartialEq for ModuleMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.name_source == other.name_source
    }
}

/// Ordered allow/deny policy evaluated against a resolved `(module,
/// license)` pair.
///
/// Precedence, matching the original evaluator exactly:
/// 1. a whitelist match always allows, regardless of license;
/// 2. a blacklist match always denies;
/// 3. if `allowed_licenses` is non-empty, the license must be a member or
///    the module is denied;
/// 4. otherwise, membership in `denied_licenses` denies;
/// 5. anything left over is allowed.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub whitelisted_modules: Vec<ModuleMatcher>,
    pub blacklisted_modules: Vec<ModuleMatcher>,
    pub allowed_licenses: Vec<License>,
    pub denied_licenses: Vec<License>,
}

impl RuleSet {
    pub fn validate(&self, module: &Module, license: &License) -> Result<(), ValidationError> {
        if let Some(matcher) = self.whitelisted_modules.iter().find(|m| m.matches(module)) {
            tracing::debug!(module = %module, matcher = %matcher, "module whitelisted");
            return Ok(());
        }

        if let Some(matcher) = self.blacklisted_modules.iter().find(|m| m.matches(module)) {
            return Err(ValidationError::BlacklistedModule {
                module: module.clone(),
                matcher: matcher.clone(),
            });
        }

        if !self.allowed_licenses.is_empty() {
            return if self.allowed_licenses.contains(license) {
                Ok(())
            } else {
                Err(ValidationError::DeniedLicense {
                    module: module.clone(),
                    license: license.clone(),
                })
            };
        }

        if self.denied_licenses.contains(license) {
            return Err(ValidationError::DeniedLicense {
                module: module.clone(),
                license: license.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Version;

    fn module(name: &str, version: &str) -> Module {
        Module::new(name, Version::parse(version).unwrap())
    }

    #[test]
    fn matcher_checks_name_and_version() {
        let matcher = ModuleMatcher::new("^github.com/foo/.*$", Some(">=1.0.0")).unwrap();
        assert!(matcher.matches(&module("github.com/foo/bar", "1.2.0")));
        assert!(!matcher.matches(&module("github.com/foo/bar", "0.9.0")));
        assert!(!matcher.matches(&module("github.com/other/bar", "1.2.0")));
    }

    #[test]
    fn matcher_without_version_constraint_matches_any_version() {
        let matcher = ModuleMatcher::new("^github.com/foo/.*$", None).unwrap();
        assert!(matcher.matches(&module("github.com/foo/bar", "0.0.1")));
    }

    #[test]
    fn whitelist_overrides_everything() {
        let rules = RuleSet {
            whitelisted_modules: vec![ModuleMatcher::new("^github.com/foo/bar$", None).unwrap()],
            denied_licenses: vec![License::by_spdx_id("GPL-3.0-only")],
            ..Default::default()
        };
        let m = module("github.com/foo/bar", "1.0.0");
        assert!(rules.validate(&m, &License::by_spdx_id("GPL-3.0-only")).is_ok());
    }

    #[test]
    fn blacklist_denies_even_allowed_license() {
        let rules = RuleSet {
            blacklisted_modules: vec![ModuleMatcher::new("^github.com/foo/bar$", None).unwrap()],
            allowed_licenses: vec![License::by_spdx_id("MIT")],
            ..Default::default()
        };
        let m = module("github.com/foo/bar", "1.0.0");
        let err = rules.validate(&m, &License::by_spdx_id("MIT")).unwrap_err();
        assert!(matches!(err, ValidationError::BlacklistedModule { .. }));
    }

    #[test]
    fn allowed_licenses_require_membership_when_non_empty() {
        let rules = RuleSet {
            allowed_licenses: vec![License::by_spdx_id("MIT")],
            ..Default::default()
        };
        let m = module("github.com/foo/bar", "1.0.0");
        assert!(rules.validate(&m, &License::by_spdx_id("MIT")).is_ok());
        let err = rules
            .validate(&m, &License::by_spdx_id("Apache-2.0"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::DeniedLicense { .. }));
    }

    #[test]
    fn denied_licenses_apply_only_when_allowed_list_is_empty() {
        let rules = RuleSet {
            denied_licenses: vec![License::by_spdx_id("GPL-3.0-only")],
            ..Default::default()
        };
        let m = module("github.com/foo/bar", "1.0.0");
        let err = rules
            .validate(&m, &License::by_spdx_id("GPL-3.0-only"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::DeniedLicense { .. }));
        assert!(rules.validate(&m, &License::by_spdx_id("MIT")).is_ok());
    }

    #[test]
    fn no_rules_allows_everything() {
        let rules = RuleSet::default();
        let m = module("github.com/foo/bar", "1.0.0");
        assert!(rules.validate(&m, &License::by_spdx_id("AGPL-3.0-only")).is_ok());
    }
}
