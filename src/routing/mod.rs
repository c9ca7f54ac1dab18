//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Exchange (host, method, path)
//!     → App (host → domain Router, default on miss)
//!     → router.rs (pool acquire, middlewares, firewall)
//!     → matcher.rs (static map, then patterns in order)
//!     → Handler | 405 | NotFound handler
//!     → after-request middlewares, pool release
//! ```
//!
//! # Design Decisions
//! - Routes may be added at any time; the table sits behind a RwLock
//! - Deterministic: same input always matches same route
//! - Static routes win over parameterised ones

pub mod matcher;
pub mod router;

pub use matcher::{Params, PatternError, RoutePattern};
pub use router::{RouteMatch, Router};
