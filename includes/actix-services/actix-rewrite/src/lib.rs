//! Actix-Web Middleware applying [`url_rewrite`] rules to incoming requests.
//!
//! Forwarded requests continue down the pipeline with their new path,
//! redirects and bare status decisions are answered immediately.
//!
//! # Example
//!
//! ```
//! use actix_web::App;
//! use actix_rewrite::{Dialect, Engine};
//!
//! let engine = Engine::from_rules(r#"
//!     RewriteRule ^/file/(.*)     /tmp/$1      [L]
//!     RewriteRule ^/redirect/(.*) /location/$1 [R=302]
//!     RewriteRule ^/blocked/(.*)  -            [F]
//! "#, Dialect::Directive);
//!
//! let app = App::new()
//!   .wrap(engine.middleware());
//! ```
//!
//! Declarative yaml rule-sets work the same way with [`Dialect::Declarative`],
//! and [`Engine::from_file`] hot-reloads a rule file on a fixed interval.
mod error;
mod factory;
mod rewrite;
mod service;
pub mod util;

pub use error::Error;
pub use factory::Middleware;
pub use rewrite::{Engine, Rewrite};
pub use service::RewriteService;

pub use url_rewrite::{Dialect, ReloadInterval};
