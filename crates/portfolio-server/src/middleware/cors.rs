//! Permissive CORS middleware.

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use futures::future::BoxFuture;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};

use crate::error::ApiResult;
use crate::router::{Middleware, Next};

/// Methods advertised to pre-flight requests.
pub const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";

/// Request headers advertised to pre-flight requests.
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Set `access-control-allow-origin: *`.
pub fn allow_any_origin(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
}

/// Answers pre-flight requests itself and marks every other response as
/// readable from any origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cors;

impl Cors {
    fn preflight() -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        let headers = response.headers_mut();
        allow_any_origin(headers);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        response
    }
}

impl Middleware for Cors {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, ApiResult<Response>> {
        Box::pin(async move {
            if *req.method() == Method::OPTIONS {
                return Ok(Self::preflight());
            }
            let mut response = next.run(req).await?;
            allow_any_origin(response.headers_mut());
            Ok(response)
        })
    }
}
