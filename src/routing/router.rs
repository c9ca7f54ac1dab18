//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store handlers per method and pattern
//! - Look up the handler for a request
//! - Run the request pipeline around it
//!
//! # Design Decisions
//! - O(1) lookup for static paths via HashMap
//! - O(n) scan of parameterised patterns in registration order
//! - Re-registering a method + pattern replaces the handler
//! - Handlers are cloned out of the table before they run, so a handler
//!   may register routes without deadlocking

use axum::http::{header, HeaderValue, Method, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Instant;

use crate::app::{App, Phase};
use crate::context::Context;
use crate::handler::{self, Handler};
use crate::http::Exchange;
use crate::observability::metrics;
use crate::routing::matcher::{normalize, Params, PatternError, RoutePattern};
use crate::security::Verdict;

/// Handlers registered for one pattern.
#[derive(Default, Clone)]
struct Endpoint {
    by_method: HashMap<Method, Handler>,
    any: Option<Handler>,
}

impl Endpoint {
    fn insert(&mut self, method: Option<Method>, handler: Handler) {
        match method {
            Some(method) => {
                self.by_method.insert(method, handler);
            }
            None => self.any = Some(handler),
        }
    }

    fn get(&self, method: &Method) -> Option<&Handler> {
        self.by_method.get(method).or(self.any.as_ref())
    }

    fn allowed(&self) -> impl Iterator<Item = &Method> {
        self.by_method.keys()
    }
}

#[derive(Default)]
struct RouteTable {
    static_routes: HashMap<String, Endpoint>,
    dynamic_routes: Vec<(RoutePattern, Endpoint)>,
}

/// Result of looking up a request.
pub enum RouteMatch {
    Found(Handler, Params),
    /// The path exists but not for this method.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// URL matcher and dispatch entry point for one domain.
pub struct Router {
    app: Weak<App>,
    table: RwLock<RouteTable>,
    not_found: RwLock<Option<Handler>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Router")
            .field("static_routes", &table.static_routes.len())
            .field("dynamic_routes", &table.dynamic_routes.len())
            .finish()
    }
}

impl Router {
    pub(crate) fn new(app: Weak<App>) -> Self {
        Self {
            app,
            table: RwLock::new(RouteTable::default()),
            not_found: RwLock::new(None),
        }
    }

    // --- Registration ---

    /// Register `handler` for `method` requests matching `pattern`.
    pub fn handle(&self, method: Method, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        self.insert(Some(method), pattern, handler)
    }

    /// Register `handler` for every method.
    pub fn any(&self, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        self.insert(None, pattern, handler)
    }

    pub fn get(&self, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        self.handle(Method::GET, pattern, handler)
    }

    pub fn post(&self, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        self.handle(Method::POST, pattern, handler)
    }

    pub fn put(&self, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        self.handle(Method::PUT, pattern, handler)
    }

    pub fn patch(&self, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        self.handle(Method::PATCH, pattern, handler)
    }

    pub fn delete(&self, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        self.handle(Method::DELETE, pattern, handler)
    }

    pub fn head(&self, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        self.handle(Method::HEAD, pattern, handler)
    }

    pub fn options(&self, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        self.handle(Method::OPTIONS, pattern, handler)
    }

    /// Replace the handler used when no route matches.
    pub fn not_found(&self, handler: Handler) {
        *self.not_found.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn insert(&self, method: Option<Method>, pattern: &str, handler: Handler) -> Result<(), PatternError> {
        let pattern = RoutePattern::parse(pattern)?;
        tracing::debug!(method = ?method, pattern = %pattern.as_str(), "Registering route");

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if pattern.is_static() {
            table
                .static_routes
                .entry(pattern.as_str().to_string())
                .or_default()
                .insert(method, handler);
            return Ok(());
        }

        match table.dynamic_routes.iter_mut().find(|(p, _)| *p == pattern) {
            Some((_, endpoint)) => endpoint.insert(method, handler),
            None => {
                let mut endpoint = Endpoint::default();
                endpoint.insert(method, handler);
                table.dynamic_routes.push((pattern, endpoint));
            }
        }
        Ok(())
    }

    // --- Lookup ---

    /// Resolve a request to its handler.
    pub fn find(&self, method: &Method, path: &str) -> RouteMatch {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut allowed: Vec<Method> = Vec::new();

        if let Some(endpoint) = table.static_routes.get(&normalize(path)) {
            if let Some(handler) = endpoint.get(method) {
                return RouteMatch::Found(handler.clone(), Params::new());
            }
            allowed.extend(endpoint.allowed().cloned());
        }

        for (pattern, endpoint) in &table.dynamic_routes {
            let Some(params) = pattern.matches(path) else {
                continue;
            };
            if let Some(handler) = endpoint.get(method) {
                return RouteMatch::Found(handler.clone(), params);
            }
            allowed.extend(endpoint.allowed().cloned());
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            allowed.dedup();
            RouteMatch::MethodNotAllowed(allowed)
        }
    }

    // --- Dispatch ---

    /// Run one request through the pipeline and return the finished exchange.
    ///
    /// Order: pre-middlewares, firewall, main middlewares, handler,
    /// after-request middlewares. The context is returned to the pool on
    /// every path out of this function.
    pub fn dispatch(&self, mut exchange: Exchange) -> Exchange {
        let start_time = Instant::now();
        let Some(app) = self.app.upgrade() else {
            tracing::error!(url = %exchange.uri(), "Router outlived its app, rejecting request");
            exchange.error("Service Unavailable", StatusCode::SERVICE_UNAVAILABLE);
            return exchange;
        };

        let mut ctx = app.pool().acquire();
        ctx.bind(exchange, &app);
        let span = ctx.logger().cloned().unwrap_or_else(tracing::Span::none);
        let _entered = span.enter();

        self.run_pipeline(&app, &mut ctx);

        let exchange = ctx.take_exchange().unwrap_or_default();
        metrics::record_request(exchange.method().as_str(), exchange.status().as_u16(), start_time);
        exchange
    }

    fn run_pipeline(&self, app: &App, ctx: &mut Context) {
        run_phase(&app.middlewares(Phase::Pre), ctx);

        if !ctx.is_aborted() {
            let client = ctx.client_id();
            if let Verdict::Blocked { retry_after } = app.firewall().check(&client) {
                reject(ctx, &client, retry_after.as_secs());
            }
        }

        run_phase(&app.middlewares(Phase::Main), ctx);

        if !ctx.is_aborted() {
            let handler = self.resolve(ctx);
            handler(ctx);
        }

        for middleware in app.middlewares(Phase::AfterRequest).iter() {
            middleware(ctx);
        }
    }

    fn resolve(&self, ctx: &mut Context) -> Handler {
        let (method, path) = match ctx.exchange() {
            Some(ex) => (ex.method().clone(), ex.path().to_string()),
            None => (Method::GET, "/".to_string()),
        };

        match self.find(&method, &path) {
            RouteMatch::Found(handler, params) => {
                ctx.set_params(params);
                handler
            }
            RouteMatch::MethodNotAllowed(allowed) => method_not_allowed(allowed),
            RouteMatch::NotFound => self
                .not_found
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .unwrap_or_else(default_not_found),
        }
    }
}

/// Run middlewares in order until one aborts.
fn run_phase(middlewares: &[crate::app::Middleware], ctx: &mut Context) {
    for middleware in middlewares {
        if ctx.is_aborted() {
            return;
        }
        middleware(ctx);
    }
}

fn reject(ctx: &mut Context, client: &str, retry_after_secs: u64) {
    tracing::warn!(client = %client, url = %ctx.uri(), retry_after_secs, "Firewall rejected request");
    metrics::record_firewall_rejection("blocked");
    ctx.error("Too Many Requests", StatusCode::TOO_MANY_REQUESTS);
    if let Some(ex) = ctx.exchange_mut() {
        ex.set_header(header::RETRY_AFTER, HeaderValue::from(retry_after_secs.max(1)));
    }
    ctx.abort();
}

fn default_not_found() -> Handler {
    handler::from_ctx(|ctx| ctx.error("Not Found", StatusCode::NOT_FOUND))
}

fn method_not_allowed(allowed: Vec<Method>) -> Handler {
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    handler::from_ctx(move |ctx| {
        ctx.error("Method Not Allowed", StatusCode::METHOD_NOT_ALLOWED);
        if let (Some(ex), Ok(value)) = (ctx.exchange_mut(), HeaderValue::from_str(&allow)) {
            ex.set_header(header::ALLOW, value);
        }
    })
}
