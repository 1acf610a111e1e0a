//! Actix-Web bindings for the rewrite [`Engine`](url_rewrite::Engine)

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use actix_http::{StatusCode, Uri};
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};
use url_rewrite::{Action, Dialect, FileSource, ReloadInterval, RewrittenUrl};

use crate::Middleware;

use super::error::Error;
use super::util::{self, HttpRequestView};

/// Outcome of evaluating a request against the rule engine
pub enum Rewrite {
    /// No rule matched
    Unchanged,
    /// Request continues down the pipeline with a new uri
    Uri(Uri),
    /// Client is redirected elsewhere
    Redirect(HttpResponse),
    /// Request is answered immediately with a bare status
    Response(HttpResponse),
}

/// Actix-Web compatible wrapper on [`url_rewrite::Engine`]
#[derive(Clone)]
pub struct Engine {
    engine: Arc<url_rewrite::Engine>,
    document_root: Option<PathBuf>,
}

impl Engine {
    /// Wraps an existing engine.
    ///
    /// The engine is shared so an application can keep a handle for
    /// status reports while the middleware evaluates requests.
    pub fn new(engine: Arc<url_rewrite::Engine>) -> Self {
        Self {
            engine,
            document_root: None,
        }
    }

    /// Builds an engine from inline rules that never reload.
    #[inline]
    pub fn from_rules(rules: &str, dialect: Dialect) -> Self {
        Self::new(Arc::new(url_rewrite::Engine::from_rules(rules, dialect)))
    }

    /// Builds an engine watching a rule file.
    ///
    /// The dialect is guessed from the file extension, see
    /// [`dialect_for`](url_rewrite::dialect_for).
    pub fn from_file<P: AsRef<Path>>(path: P, interval: ReloadInterval) -> Self {
        let path = path.as_ref();
        let engine = url_rewrite::Engine::new(
            FileSource::new(path),
            url_rewrite::dialect_for(path),
            interval,
        );
        Self::new(Arc::new(engine.init()))
    }

    /// Directory used to resolve file and directory conditions.
    ///
    /// Without a document root every `-f`/`-d` test fails.
    pub fn document_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.document_root = Some(root.into());
        self
    }

    /// Shared handle on the underlying engine
    #[inline]
    pub fn inner(&self) -> &Arc<url_rewrite::Engine> {
        &self.engine
    }

    /// Evaluates the given [`HttpRequest`](actix_web::HttpRequest) against
    /// the engine rules and returns a [`Rewrite`] response.
    pub fn rewrite(&self, req: &HttpRequest) -> Result<Rewrite, Error> {
        let view = HttpRequestView::new(req, self.document_root.as_deref());
        Ok(match self.engine.process(&view) {
            None => Rewrite::Unchanged,
            Some(result) => self.respond(result)?,
        })
    }

    fn respond(&self, result: RewrittenUrl) -> Result<Rewrite, Error> {
        Ok(match result.action() {
            // forwarding to another host is only possible as a redirect
            Action::Forward if has_scheme(result.target()) => {
                redirect(StatusCode::FOUND, result.target())?
            }
            Action::Forward => Rewrite::Uri(util::recode(result.target())?),
            Action::Redirect(sc) => redirect(StatusCode::from_u16(sc)?, result.target())?,
            Action::Status(sc) => Rewrite::Response(HttpResponse::new(StatusCode::from_u16(sc)?)),
        })
    }

    /// Converts Engine Instance into Actix-Web Middleware
    ///
    /// # Examples
    ///
    /// ```
    /// use actix_web::App;
    /// use actix_rewrite::{Dialect, Engine};
    ///
    /// let engine = Engine::from_rules("RewriteEngine On\n", Dialect::Directive);
    ///
    /// let app = App::new()
    ///     .wrap(engine.middleware());
    /// ```
    #[inline]
    pub fn middleware(self) -> Middleware {
        self.into()
    }
}

fn has_scheme(target: &str) -> bool {
    target
        .split_once("://")
        .is_some_and(|(scheme, _)| !scheme.is_empty() && !scheme.contains(['/', '?']))
}

fn redirect(status: StatusCode, location: &str) -> Result<Rewrite, Error> {
    Ok(Rewrite::Redirect(
        HttpResponse::build(status)
            .insert_header((header::LOCATION, header::HeaderValue::from_str(location)?))
            .finish(),
    ))
}
