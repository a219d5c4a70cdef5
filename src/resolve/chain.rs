//! Chains multiple resolvers, trying each in turn.

use crate::error::ValidationError;
use crate::module::{License, Module};

use super::{LicenseResolver, ResolveFuture};

/// Tries each resolver in order. On [`ValidationError::UnknownLicense`]
/// it moves on to the next one; any other error aborts the chain and
/// propagates immediately. If every resolver reports unknown, the chain
/// itself reports unknown.
pub struct ChainedResolver {
    resolvers: Vec<Box<dyn LicenseResolver>>,
}

impl ChainedResolver {
    pub fn new(resolvers: Vec<Box<dyn LicenseResolver>>) -> Self {
        Self { resolvers }
    }

    async fn resolve(&self, module: &Module) -> Result<License, ValidationError> {
        for (i, resolver) in self.resolvers.iter().enumerate() {
            match resolver.resolve_license(module).await {
                Ok(license) => return Ok(license),
                Err(ValidationError::UnknownLicense) => {
                    tracing::debug!(module = %module, resolver = i, "resolver reported unknown license, trying next");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
        Err(ValidationError::UnknownLicense)
    }
}

impl LicenseResolver for ChainedResolver {
    fn resolve_license<'a>(&'a self, module: &'a Module) -> ResolveFuture<'a> {
        Box::pin(self.resolve(module))
    }
}
