//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DispatchConfig (validated)
//!     → firewall thresholds copied into live FirewallSettings
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server stores new thresholds in the shared settings
//!     → atomic swap of Arc<DispatchConfig> for the rest
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Firewall thresholds are live: readers never cache them
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{DispatchConfig, FirewallConfig, ListenerConfig, ObservabilityConfig, PoolConfig};
pub use watcher::ConfigWatcher;
