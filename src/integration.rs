#[cfg(feature = "tower")]
use crate::mount::Handled;
use crate::mount::Mount;
use crate::Body;
use futures_core::future::BoxFuture;
use http::{Request, Response};
use std::convert::Infallible;
use std::sync::Arc;

#[cfg(feature = "tower")]
use http_body_util::combinators::UnsyncBoxBody;

#[cfg(feature = "tower")]
use tower::BoxError;

/// Rebuilds the request head as a bodiless request for the responder; the
/// original request (and its body) stays with the caller for fall-through.
fn serving_request<B>(req: &Request<B>) -> Request<()> {
    let mut serving = Request::new(());
    *serving.method_mut() = req.method().clone();
    *serving.uri_mut() = req.uri().clone();
    *serving.headers_mut() = req.headers().clone();
    *serving.version_mut() = req.version();
    serving
}

/// A cloneable service that answers every request from a [`Mount`],
/// rendering built-in 404/405 pages for requests the mount declines.
///
/// Implements [`hyper::service::Service`] with the `hyper` feature and
/// [`tower::Service`] with the `tower` feature.
#[derive(Clone)]
pub struct MountService(Arc<Mount>);

impl MountService {
    pub(crate) fn new(mount: Mount) -> Self {
        Self(Arc::new(mount))
    }
}

#[cfg(feature = "hyper")]
#[cfg_attr(docsrs, doc(cfg(feature = "hyper")))]
impl<B> hyper::service::Service<Request<B>> for MountService
where
    B: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let mount = Arc::clone(&self.0);
        let req = serving_request(&req);

        Box::pin(async move { Ok(mount.respond(&req).await) })
    }
}

#[cfg(feature = "tower")]
#[cfg_attr(docsrs, doc(cfg(feature = "tower")))]
impl<B> tower::Service<Request<B>> for MountService
where
    B: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let mount = Arc::clone(&self.0);
        let req = serving_request(&req);

        Box::pin(async move { Ok(mount.respond(&req).await) })
    }
}

/// A Tower layer that serves files from a [`Mount`] and otherwise passes
/// requests to the wrapped service.
///
/// Requires the `tower` feature.
#[cfg(feature = "tower")]
#[cfg_attr(docsrs, doc(cfg(feature = "tower")))]
#[derive(Clone)]
pub struct MountLayer(Arc<Mount>);

#[cfg(feature = "tower")]
impl MountLayer {
    pub(crate) fn new(mount: Mount) -> Self {
        Self(Arc::new(mount))
    }
}

#[cfg(feature = "tower")]
impl<S> tower::Layer<S> for MountLayer {
    type Service = MountMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MountMiddleware {
            mount: Arc::clone(&self.0),
            inner,
        }
    }
}

/// Tower middleware produced by [`MountLayer`].
///
/// Requires the `tower` feature.
#[cfg(feature = "tower")]
#[cfg_attr(docsrs, doc(cfg(feature = "tower")))]
#[derive(Clone)]
pub struct MountMiddleware<S> {
    mount: Arc<Mount>,
    inner: S,
}

#[cfg(feature = "tower")]
impl<S, ReqBody, ResBody> tower::Service<Request<ReqBody>> for MountMiddleware<S>
where
    S: tower::Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: http_body::Body<Data = bytes::Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError> + 'static,
{
    type Response = Response<UnsyncBoxBody<bytes::Bytes, BoxError>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        use http_body_util::BodyExt;

        let mount = Arc::clone(&self.mount);
        // Drive the request with a clone while keeping `self.inner`
        // available for readiness checks.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let serving_req = serving_request(&req);
            match mount.handle(&serving_req).await {
                Handled::Response(res) => Ok(box_response(res)),
                Handled::Fallthrough(Some(err)) => Ok(box_response(err.into_response())),
                Handled::Fallthrough(None) => {
                    let response = inner.call(req).await?;
                    Ok(response.map(|body| body.map_err(Into::into).boxed_unsync()))
                }
            }
        })
    }
}

#[cfg(feature = "tower")]
fn box_response(response: Response<Body>) -> Response<UnsyncBoxBody<bytes::Bytes, BoxError>> {
    use http_body_util::BodyExt;

    response.map(|body| {
        body.map_err(|err| -> BoxError { Box::new(err) })
            .boxed_unsync()
    })
}
