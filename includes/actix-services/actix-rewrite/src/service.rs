use std::rc::Rc;

use actix_web::{
    body::BoxBody,
    dev::{Path, Service, ServiceRequest, ServiceResponse, Url, forward_ready},
    error::Error as ActixError,
};
use futures_core::future::LocalBoxFuture;

use super::error::Error;
use super::rewrite::{Engine, Rewrite};
use super::util;

/// Assembled rewrite service wrapping the next stage of the pipeline
pub struct RewriteService<S> {
    service: Rc<S>,
    engine: Rc<Engine>,
}

impl<S> RewriteService<S> {
    pub(crate) fn new(service: S, engine: Rc<Engine>) -> Self {
        Self {
            service: Rc::new(service),
            engine,
        }
    }
}

impl<S> Clone for RewriteService<S> {
    fn clone(&self) -> Self {
        Self {
            service: Rc::clone(&self.service),
            engine: Rc::clone(&self.engine),
        }
    }
}

/// Apply the engine decision to the request.
///
/// Returns the request to hand to the next stage, or the response
/// that answers it right away.
fn dispatch(engine: &Engine, mut req: ServiceRequest) -> Result<ServiceRequest, ServiceResponse> {
    let rewrite = match engine.rewrite(req.request()) {
        Ok(rewrite) => rewrite,
        Err(err) => return Err(fail(req, err)),
    };
    let after = match rewrite {
        Rewrite::Unchanged => return Ok(req),
        Rewrite::Uri(after) => after,
        Rewrite::Redirect(res) | Rewrite::Response(res) => return Err(req.into_response(res)),
    };
    match util::join_uri(req.uri(), &after) {
        Ok(uri) => {
            tracing::trace!(from = %req.uri(), to = %uri, "forwarding rewritten request");
            req.head_mut().uri = uri.clone();
            *req.match_info_mut() = Path::new(Url::new(uri));
            Ok(req)
        }
        Err(err) => Err(fail(req, err)),
    }
}

fn fail(req: ServiceRequest, err: Error) -> ServiceResponse {
    tracing::error!(path = req.path(), "rewrite failed: {err:?}");
    req.error_response(err)
}

impl<S> Service<ServiceRequest> for RewriteService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = ActixError> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match dispatch(&self.engine, req) {
            Ok(req) => {
                let service = Rc::clone(&self.service);
                Box::pin(async move { service.call(req).await })
            }
            Err(res) => Box::pin(async move { Ok(res) }),
        }
    }
}
