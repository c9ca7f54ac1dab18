//! Raw request/response object.
//!
//! # Responsibilities
//! - Hold the fully buffered inbound request
//! - Accumulate the outbound response (status, headers, body)
//! - Expose the client identity used by the firewall
//!
//! # Design Decisions
//! - Body is buffered before dispatch, so handlers never await I/O
//! - Header accessors never panic: malformed values read as absent
//! - Response starts as an empty 200, like a fresh engine context

use axum::http::{
    header::{self, HeaderName, HeaderValue},
    HeaderMap, Method, Request, Response, StatusCode, Uri,
};
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;

/// Identifier used for clients whose address is unknown.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// One request and the response being built for it.
#[derive(Debug)]
pub struct Exchange {
    request: Request<Bytes>,
    remote_addr: Option<SocketAddr>,
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new(Request::new(Bytes::new()))
    }
}

impl Exchange {
    /// Wrap a buffered request.
    pub fn new(request: Request<Bytes>) -> Self {
        Self {
            request,
            remote_addr: None,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
        }
    }

    /// Attach the peer address of the connection.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    // --- Request ---

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Host the request was addressed to.
    ///
    /// Prefers the `Host` header and falls back to the URI authority.
    /// Returns `None` when neither is present or the header is not valid UTF-8.
    pub fn host(&self) -> Option<&str> {
        match self.request.headers().get(header::HOST) {
            Some(value) => value.to_str().ok(),
            None => self.request.uri().host(),
        }
    }

    /// True when a `Host` header is present but unreadable.
    pub fn has_malformed_host(&self) -> bool {
        self.request
            .headers()
            .get(header::HOST)
            .is_some_and(|v| v.to_str().is_err())
    }

    /// Request header value as text, if present and valid UTF-8.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.request
            .headers()
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Key identifying the client for rate limiting.
    pub fn client_id(&self) -> String {
        self.remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }

    // --- Response ---

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn set_content_type(&mut self, content_type: &'static str) {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    /// Append bytes to the response body.
    pub fn write(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    pub fn response_body(&self) -> &[u8] {
        &self.body
    }

    /// Drop any body written so far.
    pub fn reset_body(&mut self) {
        self.body.clear();
    }

    /// Replace the response with a plain-text error.
    pub fn error(&mut self, message: &str, status: StatusCode) {
        self.status = status;
        self.set_content_type("text/plain; charset=utf-8");
        self.body.clear();
        self.body.extend_from_slice(message.as_bytes());
    }

    /// Finish the exchange, producing the response to send.
    pub fn into_response(self) -> Response<Bytes> {
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
