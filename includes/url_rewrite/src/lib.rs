//! Framework agnostic url rewrite and redirect rule engine.
//!
//! Rules are written either in the classic [mod_rewrite](https://httpd.apache.org/docs/current/mod/mod_rewrite.html)
//! directive syntax or as a declarative yaml rule-set. Both compile into
//! the same immutable [`Configuration`] which the [`Engine`] evaluates
//! against a [`RequestView`] and hot-reloads when its source changes.
//!
//! # Example
//!
//! ```
//! use url_rewrite::{Action, Configuration, RequestCtx};
//!
//! let conf = Configuration::from_directives(r#"
//!   RewriteCond %{HTTPS} !=on
//!   RewriteRule ^/login$ https://%{SERVER_NAME}/login [R=301,L]
//!   RewriteRule ^/file/(.*)$ /tmp/$1 [L]
//! "#);
//! assert!(conf.is_ok());
//!
//! let request = RequestCtx::new("/login").server_name("example.com");
//! let result = conf.process(&request).unwrap();
//! assert_eq!(result.action(), Action::Redirect(301));
//! assert_eq!(result.target(), "https://example.com/login");
//! ```

mod chain;
mod conditions;
mod conf;
mod declarative;
mod directive;
mod engine;
pub mod error;
mod extra;
mod pattern;
mod rule;
mod source;

pub use chain::{Action, RewrittenUrl, process};
pub use conditions::context::{RequestCtx, RequestView, resolve_below};
pub use conditions::{Condition, ConditionType, Operator};
pub use conf::Configuration;
pub use declarative::{MatchType, ToType};
pub use directive::Expression;
pub use engine::{Engine, ReloadInterval, Status};
pub use extra::State;
pub use pattern::{MatchResult, Pattern, wildcard_to_regex};
pub use rule::{Dialect, Rule, RuleType};
pub use source::{ConfSource, FileSource, MemorySource, dialect_for};
