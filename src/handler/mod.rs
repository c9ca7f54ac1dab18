//! Handler adapter subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (caller picks the shape):
//!     handler::from_json(f) / from_ctx_result(f) / from_raw(f) / ...
//!     → adapter.rs wraps f in the canonical Fn(&mut Context)
//!     → Router stores the Handler
//!
//! Dispatch:
//!     Handler(&mut Context)
//!     → user function
//!     → error: log + 500 | None: 204 | Some: JSON 200 | raw: untouched
//! ```
//!
//! # Design Decisions
//! - Shapes are a closed set chosen at registration; no runtime inspection
//! - Errors stop at the adapter boundary and never reach dispatch

pub mod adapter;

use std::sync::Arc;

use crate::context::Context;

pub use adapter::{
    from_ctx, from_ctx_json, from_ctx_json_result, from_ctx_map, from_ctx_map_result,
    from_ctx_result, from_fn, from_json, from_json_result, from_map, from_map_result, from_raw,
    from_raw_result, from_result,
};

/// Canonical handler form every registered shape is reduced to.
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Key/value result type for map-returning handlers.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Body sent with every 500 produced by an adapter.
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";
