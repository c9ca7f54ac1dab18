//! Request context subsystem.
//!
//! # Data Flow
//! ```text
//! Router::dispatch
//!     → pool.rs (acquire: pop a reset context or allocate)
//!     → request.rs (bind exchange, app, request id, span)
//!     → middlewares / firewall / handler read and write through Context
//!     → request.rs (take exchange back out)
//!     → pool.rs (guard drop: reset, push back)
//! ```
//!
//! # Design Decisions
//! - `Context::reset` is the single place fields are cleared
//! - Pool is a bounded lock-free queue; overflow is dropped, never blocks
//! - Release happens in `Drop`, so every exit path returns the context

pub mod auth;
pub mod pool;
pub mod request;

pub use auth::Auth;
pub use pool::{ContextPool, PooledContext};
pub use request::Context;
