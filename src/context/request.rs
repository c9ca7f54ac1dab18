//! Per-request context handed to handlers and middlewares.

use axum::http::{header, Method, StatusCode};
use serde::Serialize;
use std::fmt::Display;
use std::sync::{Arc, Weak};
use tracing::Span;
use uuid::Uuid;

use crate::app::App;
use crate::context::auth::Auth;
use crate::http::{Exchange, X_REQUEST_ID};
use crate::routing::Params;

/// Mutable record for one in-flight request.
///
/// Instances are recycled through [`ContextPool`](crate::context::ContextPool);
/// [`Context::reset`] is the only place fields are cleared.
#[derive(Debug, Default)]
pub struct Context {
    exchange: Option<Exchange>,
    logger: Option<Span>,
    app: Weak<App>,
    auth: Option<Auth>,
    request_id: String,
    params: Params,
    aborted: bool,
}

impl Context {
    /// Return every field to its zero value.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Attach a request and its owning app.
    pub(crate) fn bind(&mut self, exchange: Exchange, app: &Arc<App>) {
        let request_id = exchange
            .header(X_REQUEST_ID)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.logger = Some(tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %exchange.method(),
            url = %exchange.uri(),
        ));
        self.request_id = request_id;
        self.app = Arc::downgrade(app);
        self.exchange = Some(exchange);
    }

    /// Detach the request, leaving the context unbound.
    pub(crate) fn take_exchange(&mut self) -> Option<Exchange> {
        self.exchange.take()
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    // --- Accessors ---

    pub fn exchange(&self) -> Option<&Exchange> {
        self.exchange.as_ref()
    }

    pub fn exchange_mut(&mut self) -> Option<&mut Exchange> {
        self.exchange.as_mut()
    }

    /// Request span carrying the request id, method and URL.
    pub fn logger(&self) -> Option<&Span> {
        self.logger.as_ref()
    }

    /// The owning app, if the context is bound and the app is alive.
    pub fn app(&self) -> Option<Arc<App>> {
        self.app.upgrade()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Full request URI, or an empty string when unbound.
    pub fn uri(&self) -> String {
        self.exchange
            .as_ref()
            .map(|ex| ex.uri().to_string())
            .unwrap_or_default()
    }

    pub fn method(&self) -> Option<&Method> {
        self.exchange.as_ref().map(Exchange::method)
    }

    pub fn path(&self) -> &str {
        self.exchange.as_ref().map(Exchange::path).unwrap_or_default()
    }

    /// Value of a `:name` or `*name` segment captured by the router.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn client_id(&self) -> String {
        self.exchange
            .as_ref()
            .map(Exchange::client_id)
            .unwrap_or_else(|| crate::http::exchange::UNKNOWN_CLIENT.to_string())
    }

    /// Basic-auth credentials, parsed on first use.
    pub fn auth(&mut self) -> Option<&Auth> {
        if self.auth.is_none() {
            self.auth = self
                .exchange
                .as_ref()
                .and_then(|ex| ex.header(header::AUTHORIZATION))
                .and_then(Auth::from_header);
        }
        self.auth.as_ref()
    }

    // --- Response ---

    pub fn status(&self) -> StatusCode {
        self.exchange
            .as_ref()
            .map(Exchange::status)
            .unwrap_or_default()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        if let Some(ex) = self.exchange.as_mut() {
            ex.set_status(status);
        }
    }

    pub fn set_content_type(&mut self, content_type: &'static str) {
        if let Some(ex) = self.exchange.as_mut() {
            ex.set_content_type(content_type);
        }
    }

    /// Append to the response body.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        if let Some(ex) = self.exchange.as_mut() {
            ex.write(data.as_ref());
        }
    }

    /// Serialize `value` as the JSON response body.
    ///
    /// The value is encoded into a buffer first; on failure nothing is written.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let encoded = serde_json::to_vec(value)?;
        if let Some(ex) = self.exchange.as_mut() {
            ex.set_content_type("application/json; charset=utf-8");
            ex.reset_body();
            ex.write(&encoded);
        }
        Ok(())
    }

    /// Replace the response with a plain-text error.
    pub fn error(&mut self, message: &str, status: StatusCode) {
        if let Some(ex) = self.exchange.as_mut() {
            ex.error(message, status);
        }
    }

    /// Stop the pipeline: remaining pre/main middlewares and the handler are skipped.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    // --- Logging and abuse reporting ---

    /// Log a handler error tagged with the request URL.
    pub fn log_error(&self, err: &dyn Display) {
        let _entered = self.logger.as_ref().map(Span::enter);
        tracing::error!(url = %self.uri(), "Error occurred: {err}");
    }

    /// Count an abuse signal for this client. Returns true if it is now blocked.
    pub fn report_hack_attempt(&self) -> bool {
        match self.app() {
            Some(app) => app.firewall().record_hack_attempt(&self.client_id()),
            None => false,
        }
    }
}
