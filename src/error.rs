//! Shared error kinds for the validation pipeline.
//!
//! Resolvers mask only [`ValidationError::UnknownLicense`] to enable
//! chaining to the next resolver; every other kind propagates unchanged
//! through cache tiers and the orchestrating validator.

use crate::module::{License, Module};
use crate::ruleset::ModuleMatcher;

/// Error returned by any component in the validation pipeline.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    /// No resolver could determine a license for the module.
    ///
    /// May be transformed into a success by the unknown-license policy
    /// wrapper ([`crate::validate::NotifyingValidator`]).
    #[error("unknown license")]
    UnknownLicense,

    /// Rule-set denied the module by name/version match.
    #[error("module {module} is in blacklist (matched by {matcher})")]
    BlacklistedModule { module: Module, matcher: ModuleMatcher },

    /// Rule-set denied the module by resolved license.
    #[error("module {module} has denied license {license}")]
    DeniedLicense { module: Module, license: License },

    /// Archive resolver received a non-zip payload.
    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    /// I/O or parsing failure while talking to an upstream service.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// Invalid or incomplete configuration, detected at startup.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// An explicit cancellation signal fired while the call was suspended.
    #[error("cancelled")]
    Cancelled,
}

impl ValidationError {
    /// True for the kinds the admission boundary maps to HTTP 403.
    ///
    /// Mirrors the original's `ErrForbidden` composite: blacklist, denied
    /// license, and (when the unknown-license policy is `deny`) unknown
    /// license all count as "forbidden" rather than an internal error.
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            ValidationError::UnknownLicense
                | ValidationError::BlacklistedModule { .. }
                | ValidationError::DeniedLicense { .. }
        )
    }

    pub fn upstream(msg: impl std::fmt::Display) -> Self {
        ValidationError::UpstreamFailure(msg.to_string())
    }

    pub fn config(msg: impl std::fmt::Display) -> Self {
        ValidationError::ConfigurationError(msg.to_string())
    }
}

impl From<reqwest::Error> for ValidationError {
    fn from(e: reqwest::Error) -> Self {
        ValidationError::UpstreamFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_forbidden_covers_expected_kinds() {
        assert!(ValidationError::UnknownLicense.is_forbidden());
        assert!(!ValidationError::Cancelled.is_forbidden());
        assert!(!ValidationError::InvalidContentType("text/html".into()).is_forbidden());
    }
}
