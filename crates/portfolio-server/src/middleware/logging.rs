//! Request logging middleware.

use std::time::Instant;

use axum::extract::Request;
use axum::response::Response;
use futures::future::BoxFuture;

use crate::error::ApiResult;
use crate::middleware::request_id::request_id_of;
use crate::router::{Middleware, Next};

/// Logs method, URI, status and elapsed time of every routed request.
///
/// Failed requests are logged at `error` and the error is passed on
/// unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, ApiResult<Response>> {
        Box::pin(async move {
            let method = req.method().clone();
            let uri = req.uri().clone();
            let request_id = request_id_of(&req);
            let started = Instant::now();

            let result = next.run(req).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(response) => tracing::info!(
                    %method,
                    %uri,
                    status = response.status().as_u16(),
                    elapsed_ms,
                    request_id = %request_id,
                    "Request completed"
                ),
                Err(error) => tracing::error!(
                    %method,
                    %uri,
                    status = error.status_code().as_u16(),
                    elapsed_ms,
                    request_id = %request_id,
                    error = %error,
                    "Request failed"
                ),
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    use crate::error::ApiError;
    use crate::router::{Dispatch, RouteGroup, Router};

    #[tokio::test]
    async fn test_errors_pass_through_unchanged() {
        let mut router = Router::new();
        router.add_middleware(RequestLogger).add_group(RouteGroup::new("").get(
            "/fail",
            |_req: Request| async { Err::<Response, _>(ApiError::BadRequest("nope".into())) },
        ));

        let req = http::Request::get("/fail").body(Body::empty()).unwrap();
        match router.dispatch(req).await {
            Dispatch::Handled(Err(ApiError::BadRequest(message))) => assert_eq!(message, "nope"),
            other => panic!("unexpected dispatch: {:?}", other),
        }
    }
}
