//! Request-dispatch core for an HTTP server.
//!
//! Normalizes handler shapes into one canonical form, recycles per-request
//! contexts through a pool, keeps per-domain routing tables and middleware
//! chains behind read-write locks, and rate-limits abusive clients.

pub mod app;
pub mod config;
pub mod context;
pub mod handler;
pub mod http;
pub mod observability;
pub mod routing;
pub mod security;

pub use app::{App, Middleware, Phase};
pub use config::DispatchConfig;
pub use context::Context;
pub use handler::Handler;
pub use http::{Exchange, HttpServer};
pub use routing::Router;
