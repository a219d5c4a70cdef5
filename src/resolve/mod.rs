//! License resolution: turn a module name+version into a [`License`],
//! chaining multiple strategies and masking "I don't know" so the chain
//! can fall through to the next strategy.

pub mod archive;
pub mod chain;
pub mod detector;
pub mod metadata;

use std::future::Future;
use std::pin::Pin;

use crate::error::ValidationError;
use crate::module::{License, Module};

pub use chain::ChainedResolver;
pub use detector::{HeuristicDetector, LicenseDetector, LicenseFiler};
pub use archive::ArchiveResolver;
pub use metadata::MetadataResolver;

/// Boxed future returned by [`LicenseResolver::resolve_license`].
///
/// `LicenseResolver` is implemented by types that need real `async` I/O
/// (HTTP calls to GitHub, the Go module proxy) as well as pure
/// cache-lookup types, and a chain composed at startup needs to hold a
/// heterogeneous `Vec<Box<dyn LicenseResolver>>`. Native `async fn` in
/// traits isn't dyn-compatible, so the future is boxed by hand here,
/// the same shape the `async-trait` macro used to expand to.
pub type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<License, ValidationError>> + Send + 'a>>;

/// Resolves the license of a single module.
///
/// Implementations that cannot determine a license return
/// [`ValidationError::UnknownLicense`] rather than any other error kind,
/// so that [`ChainedResolver`] knows to try the next resolver instead of
/// aborting the whole lookup.
pub trait LicenseResolver: Send + Sync {
    fn resolve_license<'a>(&'a self, module: &'a Module) -> ResolveFuture<'a>;
}

impl<T: LicenseResolver + ?Sized> LicenseResolver for std::sync::Arc<T> {
    fn resolve_license<'a>(&'a self, module: &'a Module) -> ResolveFuture<'a> {
        (**self).resolve_license(module)
    }
}
