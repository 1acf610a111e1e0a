use std::{fmt, str::FromStr, time::SystemTime};

use super::chain::{self, RewrittenUrl};
use super::conditions::context::RequestView;
use super::error::ConfError;
use super::rule::{Dialect, Rule};
use super::{declarative, directive};

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "directive" | "mod_rewrite" | "conf" => Ok(Self::Directive),
            "declarative" | "yaml" => Ok(Self::Declarative),
            _ => Err(format!("unknown configuration dialect: {s}")),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directive => f.write_str("directive"),
            Self::Declarative => f.write_str("declarative"),
        }
    }
}

/// Compiled, immutable set of [`Rule`]s.
///
/// Built once per load. A reload always produces a brand new
/// configuration so in-flight requests keep a consistent view.
#[derive(Debug, Default)]
pub struct Configuration {
    rules: Vec<Rule>,
    enabled: bool,
    errors: Vec<ConfError>,
    source: Option<String>,
    modified: Option<SystemTime>,
}

impl Configuration {
    /// Assemble a configuration from already compiled rules.
    pub fn new(rules: Vec<Rule>, enabled: bool, errors: Vec<ConfError>) -> Self {
        Self {
            rules,
            enabled,
            errors,
            source: None,
            modified: None,
        }
    }

    /// Compile a document written in the given dialect.
    pub fn compile(text: &str, dialect: Dialect) -> Self {
        match dialect {
            Dialect::Directive => directive::compile(text),
            Dialect::Declarative => declarative::compile(text),
        }
    }

    /// Compile a `mod_rewrite` style directive document.
    #[inline]
    pub fn from_directives(text: &str) -> Self {
        directive::compile(text)
    }

    /// Compile a declarative yaml rule-set document.
    #[inline]
    pub fn from_declarative(text: &str) -> Self {
        declarative::compile(text)
    }

    /// Attach the identifier and modification time of the source the
    /// configuration was read from.
    pub fn with_source(mut self, source: &str, modified: Option<SystemTime>) -> Self {
        self.source = Some(source.to_owned());
        self.modified = modified;
        self
    }

    #[inline]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns false when any part of the document failed to compile.
    ///
    /// Declarative rules dropped on their own do not affect this.
    #[inline]
    pub fn is_ok(&self) -> bool {
        !self.errors.iter().any(ConfError::is_fatal)
    }

    #[inline]
    pub fn errors(&self) -> &[ConfError] {
        &self.errors
    }

    #[inline]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    #[inline]
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Evaluate the rules against a request.
    ///
    /// See [`chain::process`].
    #[inline]
    pub fn process(&self, view: &dyn RequestView) -> Option<RewrittenUrl> {
        chain::process(self, view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::chain::Action;
    use crate::conditions::context::RequestCtx;

    #[test]
    fn test_chain() {
        let conf = Configuration::from_directives(
            r#"
            RewriteRule ^/static/(.*)$ /files/$1
            RewriteRule ^/files/(.*)$  /cdn/$1   [L]
            RewriteRule ^/cdn/(.*)$    /never/$1
        "#,
        );
        let req = RequestCtx::new("/static/app.js?v=3");
        let result = conf.process(&req).unwrap();
        assert_eq!(result.target(), "/cdn/app.js?v=3");
        assert!(result.is_terminal());
        assert!(result.continues_pipeline());
    }

    #[test]
    fn test_fallthrough() {
        let conf = Configuration::from_directives(
            r#"
            RewriteRule ^/old/(.*)$ /new/$1
            RewriteRule ^/missing$  /other
        "#,
        );
        let result = conf.process(&RequestCtx::new("/old/page")).unwrap();
        assert_eq!(result.target(), "/new/page");
        assert!(!result.is_terminal());
        assert_eq!(conf.process(&RequestCtx::new("/unknown")), None);
    }

    #[test]
    fn test_redirect_ends_chain() {
        let conf = Configuration::from_directives(
            r#"
            RewriteRule ^/a$ /b [R]
            RewriteRule ^/b$ /c
        "#,
        );
        let result = conf.process(&RequestCtx::new("/a")).unwrap();
        assert_eq!(result.target(), "/b");
        assert_eq!(result.action(), Action::Redirect(302));
    }

    #[test]
    fn test_request_uri_original() {
        let conf = Configuration::from_directives(
            r#"
            RewriteRule ^/a$ /b
            RewriteCond %{REQUEST_URI} ^/a$
            RewriteRule ^/b$ /c
        "#,
        );
        let result = conf.process(&RequestCtx::new("/a")).unwrap();
        assert_eq!(result.target(), "/c");
    }

    #[test]
    fn test_disabled() {
        let conf = Configuration::from_directives(
            r#"
            RewriteEngine off
            RewriteRule ^/a$ /b
        "#,
        );
        assert!(conf.is_ok());
        assert_eq!(conf.process(&RequestCtx::new("/a")), None);
    }

    #[test]
    fn test_dialect() {
        assert_eq!(Dialect::from_str("Declarative"), Ok(Dialect::Declarative));
        assert_eq!(Dialect::from_str("directive"), Ok(Dialect::Directive));
        assert!(Dialect::from_str("xml").is_err());
        assert_eq!(Dialect::Declarative.to_string(), "declarative");
    }
}
