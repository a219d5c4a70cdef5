//! Orchestrates translation, resolution, and rule-set evaluation into a
//! single pass/fail verdict for a module.

use std::future::Future;
use std::pin::Pin;

use crate::error::ValidationError;
use crate::module::Module;
use crate::notify::UnknownLicenseNotifier;
use crate::resolve::LicenseResolver;
use crate::ruleset::RuleSet;
use crate::translate::Translator;

/// Boxed future returned by [`Validator::validate`].
pub type ValidateFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ValidationError>> + Send + 'a>>;

pub trait Validator: Send + Sync {
    fn validate<'a>(&'a self, module: &'a Module) -> ValidateFuture<'a>;
}

/// The core pipeline: translate the module's name, resolve its license,
/// and check it against the configured [`RuleSet`].
///
/// If resolution on the translated name comes back unknown *and* the
/// translation actually changed the name, retries resolution against the
/// original, untranslated name once before giving up — a translator can
/// point somewhere that itself has no license information even though
/// the original module path does.
pub struct RuleSetValidator {
    translator: Box<dyn Translator>,
    resolver: Box<dyn LicenseResolver>,
    rule_set: RuleSet,
}

impl RuleSetValidator {
    pub fn new(translator: Box<dyn Translator>, resolver: Box<dyn LicenseResolver>, rule_set: RuleSet) -> Self {
        Self {
            translator,
            resolver,
            rule_set,
        }
    }

    async fn run(&self, module: &Module) -> Result<(), ValidationError> {
        let translated = self.translator.translate(module)?;

        let license = match self.resolver.resolve_license(&translated).await {
            Ok(license) => license,
            Err(ValidationError::UnknownLicense) if translated.name != module.name => {
                tracing::debug!(
                    module = %module,
                    translated = %translated,
                    "unknown license for translated name, retrying with original"
                );
                self.resolver.resolve_license(module).await?
            }
            Err(other) => return Err(other),
        };

        self.rule_set.validate(module, &license)
    }
}

impl Validator for RuleSetValidator {
    fn validate<'a>(&'a self, module: &'a Module) -> ValidateFuture<'a> {
        Box::pin(self.run(module))
    }
}

/// What to do when every resolver in the chain reports an unknown
/// license for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownLicenseAction {
    Allow,
    Warn,
    Deny,
}

impl Default for UnknownLicenseAction {
    fn default() -> Self {
        Self::Warn
    }
}

/// Wraps another [`Validator`], applying the configured
/// [`UnknownLicenseAction`] whenever the inner validator reports an
/// unknown license instead of propagating it as a hard failure.
pub struct NotifyingValidator {
    inner: Box<dyn Validator>,
    action: UnknownLicenseAction,
    notifier: Option<Box<dyn UnknownLicenseNotifier>>,
}

impl NotifyingValidator {
    pub fn new(
        inner: Box<dyn Validator>,
        action: UnknownLicenseAction,
        notifier: Option<Box<dyn UnknownLicenseNotifier>>,
    ) -> Self {
        Self {
            inner,
            action,
            notifier,
        }
    }

    async fn run(&self, module: &Module) -> Result<(), ValidationError> {
        match self.inner.validate(module).await {
            Err(ValidationError::UnknownLicense) => self.on_unknown_license(module).await,
            other => other,
        }
    }

    async fn on_unknown_license(&self, module: &Module) -> Result<(), ValidationError> {
        match self.action {
            UnknownLicenseAction::Allow => Ok(()),
            UnknownLicenseAction::Warn => {
                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier.notify_unknown_license(module).await {
                        tracing::error!(module = %module, error = %e, "failed to notify about unknown license");
                    }
                }
                Ok(())
            }
            UnknownLicenseAction::Deny => Err(ValidationError::UnknownLicense),
        }
    }
}

impl Validator for NotifyingValidator {
    fn validate<'a>(&'a self, module: &'a Module) -> ValidateFuture<'a> {
        Box::pin(self.run(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{License, Version};
    use crate::resolve::ResolveFuture;
    use crate::translate::ChainedTranslator;

    fn module(name: &str) -> Module {
        Module::new(name, Version::parse("1.0.0").unwrap())
    }

    struct UnknownResolver;
    impl LicenseResolver for UnknownResolver {
        fn resolve_license<'a>(&'a self, _module: &'a Module) -> ResolveFuture<'a> {
            Box::pin(async { Err(ValidationError::UnknownLicense) })
        }
    }

    #[tokio::test]
    async fn allow_policy_turns_unknown_into_success() {
        let inner = RuleSetValidator::new(
            Box::new(ChainedTranslator::new(vec![])),
            Box::new(UnknownResolver),
            RuleSet::default(),
        );
        let validator = NotifyingValidator::new(Box::new(inner), UnknownLicenseAction::Allow, None);
        assert!(validator.validate(&module("github.com/foo/bar")).await.is_ok());
    }

    #[tokio::test]
    async fn deny_policy_propagates_unknown() {
        let inner = RuleSetValidator::new(
            Box::new(ChainedTranslator::new(vec![])),
            Box::new(UnknownResolver),
            RuleSet::default(),
        );
        let validator = NotifyingValidator::new(Box::new(inner), UnknownLicenseAction::Deny, None);
        let err = validator.validate(&module("github.com/foo/bar")).await.unwrap_err();
        assert!(matches!(err, ValidationError::UnknownLicense));
    }

    struct FixedLicenseResolver(License);
    impl LicenseResolver for FixedLicenseResolver {
        fn resolve_license<'a>(&'a self, _module: &'a Module) -> ResolveFuture<'a> {
            let license = self.0.clone();
            Box::pin(async move { Ok(license) })
        }
    }

    #[tokio::test]
    async fn successful_resolution_is_checked_against_rule_set() {
        let rule_set = RuleSet {
            denied_licenses: vec![License::by_spdx_id("GPL-3.0-only")],
            ..Default::default()
        };
        let validator = RuleSetValidator::new(
            Box::new(ChainedTranslator::new(vec![])),
            Box::new(FixedLicenseResolver(License::by_spdx_id("GPL-3.0-only"))),
            rule_set,
        );
        let err = validator.validate(&module("github.com/foo/bar")).await.unwrap_err();
        assert!(matches!(err, ValidationError::DeniedLicense { .. }));
    }
}
