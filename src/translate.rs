//! Module name translators: rewrite a module's name before license
//! resolution so downstream resolvers see a canonical, usually
//! GitHub-hosted, path.

use regex::Regex;

use crate::error::ValidationError;
use crate::module::Module;

/// Rewrites a module's name. Implementations never touch the version.
pub trait Translator: Send + Sync {
    fn translate(&self, module: &Module) -> Result<Module, ValidationError>;
}

/// Applies a sequence of translators in order, feeding each one's output
/// to the next. Aborts and propagates on the first error.
pub struct ChainedTranslator {
    translators: Vec<Box<dyn Translator>>,
}

impl ChainedTranslator {
    pub fn new(translators: Vec<Box<dyn Translator>>) -> Self {
        Self { translators }
    }
}

impl Translator for ChainedTranslator {
    fn translate(&self, module: &Module) -> Result<Module, ValidationError> {
        let mut current = module.clone();
        for translator in &self.translators {
            current = translator.translate(&current)?;
        }
        Ok(current)
    }
}

/// A single user-configured name rewrite: the first pattern in the
/// configured list whose regex matches wins, `regex::Regex::replace`
/// semantics (`$1`-style capture references in `replace`).
pub struct OverrideTranslator {
    rules: Vec<(Regex, String)>,
}

impl OverrideTranslator {
    pub fn new(rules: Vec<(Regex, String)>) -> Self {
        Self { rules }
    }
}

impl Translator for OverrideTranslator {
    fn translate(&self, module: &Module) -> Result<Module, ValidationError> {
        for (pattern, replacement) in &self.rules {
            if pattern.is_match(&module.name) {
                let name = pattern.replace(&module.name, replacement.as_str());
                return Ok(module.with_name(name.into_owned()));
            }
        }
        Ok(module.clone())
    }
}

/// Rewrites the Go standard "extended" module paths
/// (`golang.org/x/<pkg>`, `go.googlesource.com/<pkg>`) to their GitHub
/// mirror under `github.com/golang/<pkg>`.
pub struct GolangXTranslator {
    pattern: Regex,
}

impl Default for GolangXTranslator {
    fn default() -> Self {
        Self {
            pattern: Regex::new(r"^(go\.googlesource\.com|golang\.org/x)/([^/]+)$")
                .expect("static golang.org/x pattern is valid"),
        }
    }
}

impl Translator for GolangXTranslator {
    fn translate(&self, module: &Module) -> Result<Module, ValidationError> {
        match self.pattern.captures(&module.name) {
            Some(caps) => {
                let pkg = &caps[2];
                Ok(module.with_name(format!("github.com/golang/{pkg}")))
            }
            None => Ok(module.clone()),
        }
    }
}

/// Rewrites `gopkg.in` vanity import paths to their backing GitHub
/// repository. `gopkg.in/pkg.vN` maps to `github.com/go-pkg/pkg`;
/// `gopkg.in/user/pkg.vN` maps to `github.com/user/pkg`.
pub struct VanityPkgTranslator {
    pattern: Regex,
}

impl Default for VanityPkgTranslator {
    fn default() -> Self {
        Self {
            pattern: Regex::new(
                r"(?i)^gopkg\.in/(?:([^/.]+)/)?([^/.]+)\.(?:v0|v[1-9][0-9]*)(?:\.0|\.[1-9][0-9]*){0,2}(?:-unstable)?(?:\.git)?(?:/.*)?$",
            )
            .expect("static gopkg.in pattern is valid"),
        }
    }
}

impl Translator for VanityPkgTranslator {
    fn translate(&self, module: &Module) -> Result<Module, ValidationError> {
        match self.pattern.captures(&module.name) {
            Some(caps) => {
                let pkg = &caps[2];
                let user = caps
                    .get(1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| format!("go-{pkg}"));
                Ok(module.with_name(format!("github.com/{user}/{pkg}")))
            }
            None => Ok(module.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Version;

    fn module(name: &str) -> Module {
        Module::new(name, Version::parse("1.0.0").unwrap())
    }

    #[test]
    fn golang_x_rewrites_extended_packages() {
        let t = GolangXTranslator::default();
        let out = t.translate(&module("golang.org/x/net")).unwrap();
        assert_eq!(out.name, "github.com/golang/net");

        let out = t.translate(&module("go.googlesource.com/tools")).unwrap();
        assert_eq!(out.name, "github.com/golang/tools");
    }

    #[test]
    fn golang_x_leaves_unrelated_names_alone() {
        let t = GolangXTranslator::default();
        let out = t.translate(&module("github.com/foo/bar")).unwrap();
        assert_eq!(out.name, "github.com/foo/bar");
    }

    #[test]
    fn golang_x_does_not_match_a_subpath() {
        // Only the bare `golang.org/x/<pkg>` form is a module; a subpath
        // like `.../net/http` names a package within it, not a module,
        // and must be left untouched rather than have its subpath dropped.
        let t = GolangXTranslator::default();
        let out = t.translate(&module("golang.org/x/net/http")).unwrap();
        assert_eq!(out.name, "golang.org/x/net/http");
    }

    #[test]
    fn vanity_rewrites_with_explicit_user() {
        let t = VanityPkgTranslator::default();
        let out = t.translate(&module("gopkg.in/yaml.v2")).unwrap();
        assert_eq!(out.name, "github.com/go-yaml/yaml");
    }

    #[test]
    fn vanity_rewrites_with_user_segment() {
        let t = VanityPkgTranslator::default();
        let out = t.translate(&module("gopkg.in/go-playground/validator.v9")).unwrap();
        assert_eq!(out.name, "github.com/go-playground/validator");
    }

    #[test]
    fn vanity_rewrites_multi_segment_version_suffix() {
        let t = VanityPkgTranslator::default();
        let out = t.translate(&module("gopkg.in/yaml.v2.1")).unwrap();
        assert_eq!(out.name, "github.com/go-yaml/yaml");
    }

    #[test]
    fn vanity_rewrites_unstable_and_git_suffixes() {
        let t = VanityPkgTranslator::default();
        let out = t.translate(&module("gopkg.in/mitchellh/foo.v22-unstable")).unwrap();
        assert_eq!(out.name, "github.com/mitchellh/foo");

        let out = t.translate(&module("gopkg.in/mitchellh/foo.v22.git")).unwrap();
        assert_eq!(out.name, "github.com/mitchellh/foo");
    }

    #[test]
    fn vanity_rewrites_with_sub_path() {
        let t = VanityPkgTranslator::default();
        let out = t.translate(&module("gopkg.in/yaml.v2/sub/pkg")).unwrap();
        assert_eq!(out.name, "github.com/go-yaml/yaml");
    }

    #[test]
    fn override_translator_uses_first_match() {
        let rules = vec![
            (Regex::new(r"^private\.example\.com/(.+)$").unwrap(), "github.com/acme/$1".to_string()),
        ];
        let t = OverrideTranslator::new(rules);
        let out = t.translate(&module("private.example.com/widget")).unwrap();
        assert_eq!(out.name, "github.com/acme/widget");
    }

    #[test]
    fn override_translator_passthrough_when_no_match() {
        let t = OverrideTranslator::new(vec![]);
        let out = t.translate(&module("github.com/foo/bar")).unwrap();
        assert_eq!(out.name, "github.com/foo/bar");
    }

    #[test]
    fn chained_translator_applies_in_order() {
        let chain = ChainedTranslator::new(vec![
            Box::new(OverrideTranslator::new(vec![(
                Regex::new(r"^golang\.org/x/(.+)$").unwrap(),
                "go.googlesource.com/$1".to_string(),
            )])),
            Box::new(GolangXTranslator::default()),
        ]);
        let out = chain.translate(&module("golang.org/x/crypto")).unwrap();
        assert_eq!(out.name, "github.com/golang/crypto");
    }
}
