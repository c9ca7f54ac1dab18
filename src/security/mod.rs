//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (after pre-middlewares):
//!     → firewall.rs (blocked? over the per-minute limit?)
//!     → 429 Too Many Requests, or continue to main middlewares
//!
//! Abuse signals (malformed host, handler reports):
//!     → firewall.rs (hack attempt counter → block)
//! ```
//!
//! # Design Decisions
//! - Fail open when disabled: `-1` thresholds never engage
//! - Blocking is per client id (remote IP)
//! - Rejections never reach the handler

pub mod firewall;

pub use firewall::{Firewall, FirewallSettings, Verdict};
