//! Utilities used to feed Actix-Web requests into the rewrite engine

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    str::FromStr,
};

use actix_http::{
    Uri,
    uri::{Authority, Parts},
};
use actix_web::HttpRequest;
use url_rewrite::RequestView;

use super::error::Error;

/// [`RequestView`] implementation over an [`HttpRequest`].
///
/// Connection details are resolved once when the view is built since
/// actix only lends them out behind a temporary borrow.
pub struct HttpRequestView<'a> {
    req: &'a HttpRequest,
    scheme: String,
    server_name: String,
    server_port: Option<u16>,
    remote_addr: Option<String>,
    protocol: String,
    document_root: Option<&'a Path>,
}

impl<'a> HttpRequestView<'a> {
    pub fn new(req: &'a HttpRequest, document_root: Option<&'a Path>) -> Self {
        let info = req.connection_info();
        let (server_name, port) = match Authority::from_str(info.host()) {
            Ok(authority) => (authority.host().to_owned(), authority.port_u16()),
            Err(_) => (info.host().to_owned(), None),
        };
        Self {
            req,
            scheme: info.scheme().to_owned(),
            server_name,
            server_port: port.or_else(|| Some(req.app_config().local_addr().port())),
            remote_addr: req.peer_addr().map(|addr| addr.ip().to_string()),
            protocol: format!("{:?}", req.version()),
            document_root,
        }
    }
}

impl RequestView for HttpRequestView<'_> {
    fn path(&self) -> &str {
        self.req.path()
    }

    fn query_string(&self) -> Option<&str> {
        self.req.uri().query()
    }

    fn method(&self) -> &str {
        self.req.method().as_str()
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

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.req
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(Cow::Borrowed)
    }

    fn parameter(&self, name: &str) -> Option<Cow<'_, str>> {
        let query = self.req.uri().query()?;
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .ok()?
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| Cow::Owned(value))
    }

    fn resolve_path(&self, path: &str) -> Option<PathBuf> {
        url_rewrite::resolve_below(self.document_root?, path)
    }
}

#[inline]
pub(crate) fn recode(uri: &str) -> Result<Uri, Error> {
    Ok(Uri::from_str(uri)?)
}

/// Build new URI keeping scheme and authority of the original request
/// and taking path and query from the rewritten uri.
#[inline]
pub fn join_uri(before: &Uri, after: &Uri) -> Result<Uri, Error> {
    let mut parts = Parts::from(before.clone());
    parts.path_and_query = after.path_and_query().cloned();
    Ok(Uri::from_parts(parts)?)
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn test_view() {
        let req = TestRequest::with_uri("/search?q=rust+lang&page=2")
            .insert_header(("host", "example.com:8080"))
            .insert_header(("user-agent", "curl/8.0"))
            .to_http_request();
        let view = HttpRequestView::new(&req, None);

        assert_eq!(view.path(), "/search");
        assert_eq!(view.query_string(), Some("q=rust+lang&page=2"));
        assert_eq!(view.method(), "GET");
        assert_eq!(view.scheme(), "http");
        assert_eq!(view.server_name(), "example.com");
        assert_eq!(view.server_port(), Some(8080));
        assert_eq!(view.protocol(), "HTTP/1.1");
        assert_eq!(view.header("User-Agent").as_deref(), Some("curl/8.0"));
        assert_eq!(view.parameter("q").as_deref(), Some("rust lang"));
        assert_eq!(view.resolve_path("/index.html"), None);
    }

    #[test]
    fn test_join_uri() {
        let before = Uri::from_static("http://example.com/old?a=b");
        let after = Uri::from_static("/new/path?page=1");
        let joined = join_uri(&before, &after).unwrap();
        assert_eq!(joined.to_string(), "http://example.com/new/path?page=1");

        let before = Uri::from_static("/old");
        assert_eq!(join_uri(&before, &after).unwrap().to_string(), "/new/path?page=1");
    }
}
