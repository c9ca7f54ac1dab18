//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch core produces:
//!     → tracing events (request span: request_id, method, url)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every handler and encoding error carries the request URL
//! - Metrics are cheap (no-op without a recorder)

pub mod logging;
pub mod metrics;
