//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, trace, body buffering)
//!     → exchange.rs (buffered request + response under construction)
//!     → App::handle on a blocking worker
//!     → exchange.rs (into_response)
//!     → Send to client
//! ```

pub mod exchange;
pub mod request;
pub mod server;

pub use exchange::Exchange;
pub use request::X_REQUEST_ID;
pub use server::{HttpServer, ServerError, ServerState};
