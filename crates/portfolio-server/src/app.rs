//! Composition root: route dispatch, static fallthrough and the outer
//! tower layers.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;

use crate::error::ApiError;
use crate::middleware::cors::allow_any_origin;
use crate::middleware::request_id::{propagate_request_id, request_id_layer};
use crate::router::{Dispatch, Router};
use crate::routes::build_router;
use crate::state::AppState;

/// The assembled application.
#[derive(Debug)]
pub struct Application {
    router: Router,
    content_dir: PathBuf,
}

impl Application {
    pub fn new(state: AppState) -> Self {
        let router = build_router(&state);
        if state.config().dev_mode {
            for route in router.route_list() {
                tracing::info!(%route, "Registered route");
            }
        }
        Self {
            router,
            content_dir: state.config().content_dir.clone(),
        }
    }

    /// Answer one request. Every response carries
    /// `access-control-allow-origin: *`.
    pub async fn handle(&self, req: Request) -> Response {
        let mut response = match self.router.dispatch(req).await {
            Dispatch::Handled(Ok(response)) => response,
            Dispatch::Handled(Err(error)) => error.into_response(),
            Dispatch::NotMatched(req) => self.serve_static(req).await,
        };
        allow_any_origin(response.headers_mut());
        response
    }

    /// Serve a file under the content directory. Paths with a hidden
    /// segment are refused.
    async fn serve_static(&self, req: Request) -> Response {
        let path = req.uri().path().to_string();
        if has_hidden_segment(&path) {
            tracing::debug!(%path, "Refused hidden path");
            return ApiError::NotFound("Not found".to_string()).into_response();
        }

        match ServeDir::new(&self.content_dir).oneshot(req).await {
            Ok(response) => {
                tracing::debug!(%path, status = %response.status(), "Static file request");
                response.map(Body::new)
            }
            Err(never) => match never {},
        }
    }

    /// Wrap the application in the request id and panic layers.
    pub fn into_router(self) -> axum::Router {
        let app = Arc::new(self);
        axum::Router::new()
            .fallback(move |req: Request| {
                let app = app.clone();
                async move { app.handle(req).await }
            })
            .layer(middleware::from_fn(propagate_request_id))
            .layer(request_id_layer())
            .layer(CatchPanicLayer::custom(panic_response))
    }
}

/// True when any segment is a dotfile or dot-directory, including the
/// percent-encoded form.
fn has_hidden_segment(path: &str) -> bool {
    path.split('/').any(|segment| {
        segment.starts_with('.') || segment.to_ascii_lowercase().starts_with("%2e")
    })
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else if let Some(text) = panic.downcast_ref::<&str>() {
        text.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Request handler panicked");

    let mut response = ApiError::Internal(detail).into_response();
    allow_any_origin(response.headers_mut());
    response
}
