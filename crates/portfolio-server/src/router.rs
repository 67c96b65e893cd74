//! Route table and middleware chain.
//!
//! Routes are registered in prefixed [`RouteGroup`]s and keyed by
//! `(method, full path)`. Dispatch tries the exact table first, then the
//! parameterised routes (`/emails/:id`) in registration order. A match runs
//! the middleware chain in registration order with the handler as the
//! terminal step; a miss hands the request back as
//! [`Dispatch::NotMatched`] so the caller can fall through to static files.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use futures::future::BoxFuture;
use http::{HeaderValue, Method, StatusCode, header};

use crate::error::ApiResult;

// ============================================================================
// Handlers and Middleware
// ============================================================================

/// A terminal request handler.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture<'static, ApiResult<Response>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<Response>> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, ApiResult<Response>> {
        Box::pin(self(req))
    }
}

/// A request interceptor.
///
/// Either returns its own response (short-circuit) or calls
/// [`Next::run`], which consumes the continuation so it can run at most
/// once.
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, ApiResult<Response>>;
}

/// The rest of the chain after the current middleware.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn Middleware>], endpoint: &'a dyn Handler) -> Self {
        Self { chain, endpoint }
    }

    /// Run the remaining middleware, then the handler.
    pub fn run(self, req: Request) -> BoxFuture<'a, ApiResult<Response>> {
        match self.chain.split_first() {
            Some((first, rest)) => first.handle(
                req,
                Next {
                    chain: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => self.endpoint.call(req),
        }
    }
}

// ============================================================================
// Path Parameters
// ============================================================================

/// Values captured by `:name` segments, stored in request extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct PatternRoute {
    method: Method,
    path: String,
    segments: Vec<Segment>,
    handler: Arc<dyn Handler>,
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_start_matches('/').split('/')
}

fn parse_pattern(path: &str) -> Option<Vec<Segment>> {
    let segments: Vec<Segment> = split_segments(path)
        .map(|s| match s.strip_prefix(':') {
            Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
            _ => Segment::Literal(s.to_string()),
        })
        .collect();
    segments
        .iter()
        .any(|s| matches!(s, Segment::Param(_)))
        .then_some(segments)
}

impl PatternRoute {
    fn capture(&self, path: &str) -> Option<PathParams> {
        let mut params = HashMap::new();
        let mut parts = split_segments(path);
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        parts.next().is_none().then_some(PathParams(params))
    }
}

// ============================================================================
// Route Groups
// ============================================================================

/// Routes sharing a path prefix.
pub struct RouteGroup {
    prefix: String,
    routes: Vec<(Method, String, Arc<dyn Handler>)>,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            routes: Vec::new(),
        }
    }

    /// Register `handler` for `method` at `prefix + path`.
    pub fn route(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let mut full = format!("{}{}", self.prefix, path);
        if full.is_empty() {
            full.push('/');
        }
        self.routes.push((method, full, Arc::new(handler)));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::POST, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::DELETE, path, handler)
    }
}

// ============================================================================
// Router
// ============================================================================

/// Outcome of [`Router::dispatch`].
#[derive(Debug)]
pub enum Dispatch {
    /// A route matched and ran through the middleware chain.
    Handled(ApiResult<Response>),
    /// No route matched; the request is returned untouched.
    NotMatched(Request),
}

/// Method + path dispatch table with a middleware chain.
#[derive(Default)]
pub struct Router {
    exact: HashMap<(Method, String), Arc<dyn Handler>>,
    patterns: Vec<PatternRoute>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add all routes of a group. A later registration of the same method
    /// and path replaces the earlier one.
    pub fn add_group(&mut self, group: RouteGroup) -> &mut Self {
        for (method, path, handler) in group.routes {
            match parse_pattern(&path) {
                Some(segments) => {
                    if let Some(existing) = self
                        .patterns
                        .iter_mut()
                        .find(|r| r.method == method && r.path == path)
                    {
                        tracing::warn!(%method, %path, "Route registered twice, replacing");
                        existing.handler = handler;
                    } else {
                        self.patterns.push(PatternRoute {
                            method,
                            path,
                            segments,
                            handler,
                        });
                    }
                }
                None => {
                    if self
                        .exact
                        .insert((method.clone(), path.clone()), handler)
                        .is_some()
                    {
                        tracing::warn!(%method, %path, "Route registered twice, replacing");
                    }
                }
            }
        }
        self
    }

    /// Append a middleware; middleware runs in registration order.
    pub fn add_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<dyn Handler>, PathParams)> {
        if let Some(handler) = self.exact.get(&(method.clone(), path.to_string())) {
            return Some((handler.clone(), PathParams::default()));
        }
        self.patterns
            .iter()
            .filter(|route| &route.method == method)
            .find_map(|route| {
                route
                    .capture(path)
                    .map(|params| (route.handler.clone(), params))
            })
    }

    /// Methods registered for `path`, in a stable order.
    fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self
            .exact
            .keys()
            .filter(|(_, p)| p == path)
            .map(|(m, _)| m.clone())
            .chain(
                self.patterns
                    .iter()
                    .filter(|route| route.capture(path).is_some())
                    .map(|route| route.method.clone()),
            )
            .collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods.dedup();
        methods
    }

    /// Every registered `METHOD path`, sorted by path.
    pub fn route_list(&self) -> Vec<String> {
        let mut routes: Vec<(&str, &Method)> = self
            .exact
            .keys()
            .map(|(method, path)| (path.as_str(), method))
            .chain(self.patterns.iter().map(|r| (r.path.as_str(), &r.method)))
            .collect();
        routes.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.as_str().cmp(b.1.as_str())));
        routes
            .into_iter()
            .map(|(path, method)| format!("{} {}", method, path))
            .collect()
    }

    /// Route a request.
    pub async fn dispatch(&self, mut req: Request) -> Dispatch {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        if let Some((handler, params)) = self.lookup(&method, &path) {
            req.extensions_mut().insert(params);
            return Dispatch::Handled(Next::new(&self.middleware, handler.as_ref()).run(req).await);
        }

        if method == Method::OPTIONS {
            let allowed = self.allowed_methods(&path);
            if !allowed.is_empty() {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .chain(std::iter::once("OPTIONS"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let endpoint = move |_req: Request| {
                    let allow = allow.clone();
                    async move { options_response(&allow) }
                };
                return Dispatch::Handled(Next::new(&self.middleware, &endpoint).run(req).await);
            }
        }

        tracing::debug!(%method, %path, "No route matched");
        Dispatch::NotMatched(req)
    }
}

fn options_response(allow: &str) -> ApiResult<Response> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    if let Ok(value) = HeaderValue::from_str(allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    Ok(response)
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("exact_routes", &self.exact.len())
            .field("pattern_routes", &self.patterns.len())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}
