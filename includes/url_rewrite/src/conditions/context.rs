//! Read-only request accessors used during rule evaluation.
//!
//! The engine never sees the transport request. Callers hand it a
//! [`RequestView`] and the engine pulls the attributes each
//! [`Condition`](super::Condition) asks for.

use std::{
    borrow::Cow,
    collections::HashMap,
    path::{Component, Path, PathBuf},
};

use chrono::{DateTime, Local};
use percent_encoding::percent_decode_str;
use unicase::UniCase;

macro_rules! setter {
    ($key:ident, $ref:ident) => {
        #[doc = concat!("Assign value for `", stringify!($ref), "` variable")]
        pub fn $key<S: Into<String>>(mut self, $key: S) -> Self {
            self.$key = Some($key.into());
            self
        }
    };
}

/// Capability based view of a single HTTP request.
///
/// Only the required accessors need to be implemented. Cookie and
/// parameter lookups fall back to parsing the `Cookie` header and the
/// query string.
pub trait RequestView {
    /// Request path without query string
    fn path(&self) -> &str;

    /// Raw query string without the leading `?`
    fn query_string(&self) -> Option<&str>;

    /// HTTP method, e.g. `GET`
    fn method(&self) -> &str;

    /// Request scheme, `http` or `https`
    fn scheme(&self) -> &str;

    /// Host name the request was addressed to
    fn server_name(&self) -> &str;

    /// Port the request was received on
    fn server_port(&self) -> Option<u16>;

    /// Address of the client
    fn remote_addr(&self) -> Option<&str>;

    /// Host name of the client
    fn remote_host(&self) -> Option<&str> {
        self.remote_addr()
    }

    /// Authenticated user name
    fn remote_user(&self) -> Option<&str> {
        None
    }

    /// Protocol version, e.g. `HTTP/1.1`
    fn protocol(&self) -> &str {
        "HTTP/1.1"
    }

    /// Header value by case-insensitive name
    fn header(&self, name: &str) -> Option<Cow<'_, str>>;

    /// Cookie value by name
    fn cookie(&self, name: &str) -> Option<Cow<'_, str>> {
        let header = self.header("cookie")?;
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| Cow::Owned(value.trim_matches('"').to_owned()))
    }

    /// Query parameter value by name
    fn parameter(&self, name: &str) -> Option<Cow<'_, str>> {
        self.query_string()?
            .split('&')
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(key, _)| decode(key) == name)
            .map(|(_, value)| Cow::Owned(decode(value)))
    }

    /// Map a request path onto the filesystem below the document root.
    ///
    /// Returns `None` when the path can not be resolved.
    fn resolve_path(&self, path: &str) -> Option<PathBuf>;

    /// Time used for time based conditions
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[inline]
fn decode(s: &str) -> String {
    let s = s.replace('+', " ");
    percent_decode_str(&s).decode_utf8_lossy().into_owned()
}

/// Join a request path onto a document root, rejecting anything that
/// would climb out of it.
pub fn resolve_below(root: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(root.join(relative))
}

/// Owned [`RequestView`] implementation assembled with builder methods.
///
/// Useful for embedding the engine outside of a web framework and for
/// tests.
#[derive(Clone, Debug)]
pub struct RequestCtx {
    path: String,
    query_string: Option<String>,
    method: String,
    scheme: String,
    protocol: String,
    server_name: String,
    server_port: Option<u16>,
    remote_addr: Option<String>,
    remote_host: Option<String>,
    remote_user: Option<String>,
    headers: HashMap<UniCase<String>, String>,
    document_root: Option<PathBuf>,
    now: Option<DateTime<Local>>,
}

impl Default for RequestCtx {
    fn default() -> Self {
        Self::new("/")
    }
}

impl RequestCtx {
    /// Build a `GET` request for the given path.
    ///
    /// A `?` in the path is split off into the query string.
    pub fn new(path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned())),
            None => (path, None),
        };
        Self {
            path: path.to_owned(),
            query_string: query,
            method: "GET".to_owned(),
            scheme: "http".to_owned(),
            protocol: "HTTP/1.1".to_owned(),
            server_name: "localhost".to_owned(),
            server_port: None,
            remote_addr: None,
            remote_host: None,
            remote_user: None,
            headers: HashMap::new(),
            document_root: None,
            now: None,
        }
    }

    setter!(query_string, QUERY_STRING);
    setter!(remote_addr, REMOTE_ADDR);
    setter!(remote_host, REMOTE_HOST);
    setter!(remote_user, REMOTE_USER);

    /// Assign value for `REQUEST_METHOD` variable
    pub fn method<S: Into<String>>(mut self, method: S) -> Self {
        self.method = method.into();
        self
    }

    /// Assign value for `HTTPS` variable via the request scheme
    pub fn scheme<S: Into<String>>(mut self, scheme: S) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Assign value for `SERVER_PROTOCOL` variable
    pub fn protocol<S: Into<String>>(mut self, protocol: S) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Assign value for `SERVER_NAME` and `HTTP_HOST` variables
    pub fn server_name<S: Into<String>>(mut self, server_name: S) -> Self {
        self.server_name = server_name.into();
        self
    }

    /// Assign value for `SERVER_PORT` variable
    pub fn server_port(mut self, port: u16) -> Self {
        self.server_port = Some(port);
        self
    }

    /// Add a request header
    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.insert(UniCase::new(name.into()), value.into());
        self
    }

    /// Directory used to resolve `REQUEST_FILENAME` and file tests
    pub fn document_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.document_root = Some(root.into());
        self
    }

    /// Pin the time seen by time based conditions
    pub fn time(mut self, now: DateTime<Local>) -> Self {
        self.now = Some(now);
        self
    }
}

impl RequestView for RequestCtx {
    fn path(&self) -> &str {
        &self.path
    }

    fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn server_name(&self) -> &str {
        &self.server_name
    }

    fn server_port(&self) -> Option<u16> {
        self.server_port
    }

    fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    fn remote_host(&self) -> Option<&str> {
        self.remote_host.as_deref().or(self.remote_addr.as_deref())
    }

    fn remote_user(&self) -> Option<&str> {
        self.remote_user.as_deref()
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers
            .get(&UniCase::new(name.to_owned()))
            .map(|v| Cow::Borrowed(v.as_str()))
    }

    fn resolve_path(&self, path: &str) -> Option<PathBuf> {
        resolve_below(self.document_root.as_deref()?, path)
    }

    fn now(&self) -> DateTime<Local> {
        self.now.unwrap_or_else(Local::now)
    }
}
