//! Origin filter for browser connections
//!
//! Browsers always send `Origin` (on the WebSocket upgrade too); editors, the
//! CLI and the SDK do not. A request carrying an `Origin` other than the
//! configured one is refused with 403 before it reaches the RPC layer.

use http::{header, HeaderValue, Request, Response, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

/// Accepts every origin when configured as the allowed origin
pub const ANY_ORIGIN: &str = "*";

/// Layer installing [`OriginFilter`]
#[derive(Debug, Clone, Default)]
pub struct OriginFilterLayer {
    allowed: Option<Arc<str>>,
}

impl OriginFilterLayer {
    /// `None` refuses every request that carries an `Origin` header
    pub fn new(allowed: Option<String>) -> Self {
        Self {
            allowed: allowed.map(|origin| Arc::from(origin.trim_end_matches('/'))),
        }
    }

    pub fn is_allowed(&self, origin: &HeaderValue) -> bool {
        let Some(allowed) = self.allowed.as_deref() else {
            return false;
        };
        if allowed == ANY_ORIGIN {
            return true;
        }
        origin
            .to_str()
            .map(|origin| origin.trim_end_matches('/') == allowed)
            .unwrap_or(false)
    }
}

impl<S> Layer<S> for OriginFilterLayer {
    type Service = OriginFilter<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OriginFilter {
            inner,
            filter: self.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OriginFilter<S> {
    inner: S,
    filter: OriginFilterLayer,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for OriginFilter<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    ResBody: From<&'static str> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        if let Some(origin) = request.headers().get(header::ORIGIN) {
            if !self.filter.is_allowed(origin) {
                warn!(origin = ?origin, "Refused connection from origin");
                let mut response = Response::new(ResBody::from("Origin not allowed"));
                *response.status_mut() = StatusCode::FORBIDDEN;
                return Box::pin(async move { Ok(response) });
            }
        }
        Box::pin(self.inner.call(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::ServiceExt;

    async fn status_for(layer: &OriginFilterLayer, origin: Option<&str>) -> StatusCode {
        let inner = tower::service_fn(|_request: Request<()>| async {
            Ok::<_, Infallible>(Response::new(String::from("ok")))
        });
        let mut request = Request::builder().uri("/");
        if let Some(origin) = origin {
            request = request.header(header::ORIGIN, origin);
        }
        layer
            .layer(inner)
            .oneshot(request.body(()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_requests_without_origin_pass() {
        let layer = OriginFilterLayer::new(None);
        assert_eq!(status_for(&layer, None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_browser_origins_refused_by_default() {
        let layer = OriginFilterLayer::new(None);
        assert_eq!(
            status_for(&layer, Some("https://evil.test")).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_only_configured_origin_passes() {
        let layer = OriginFilterLayer::new(Some("https://app.test/".to_string()));
        assert_eq!(status_for(&layer, Some("https://app.test")).await, StatusCode::OK);
        assert_eq!(
            status_for(&layer, Some("https://app.test.evil.test")).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&layer, Some("null")).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_wildcard_accepts_any_origin() {
        let layer = OriginFilterLayer::new(Some(ANY_ORIGIN.to_string()));
        assert_eq!(status_for(&layer, Some("file://")).await, StatusCode::OK);
    }
}
