//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dispatcher.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the dispatcher.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Firewall thresholds. `-1` disables the corresponding check.
    pub firewall: FirewallConfig,

    /// Context pool sizing.
    pub pool: PoolConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes, buffered before dispatch.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Firewall configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FirewallConfig {
    /// Requests allowed per client per minute (-1 = unlimited).
    pub max_requests_per_minute: i64,

    /// How long a blocked client stays blocked, in seconds (-1 = never block).
    pub block_timeout_secs: i64,

    /// Abuse signals tolerated before a client is blocked (-1 = unlimited).
    pub max_hack_attempts: i32,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: -1,
            block_timeout_secs: -1,
            max_hack_attempts: 5,
        }
    }
}

/// Context pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of idle contexts kept for reuse.
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_firewall() {
        let config = DispatchConfig::default();
        assert_eq!(config.firewall.max_requests_per_minute, -1);
        assert_eq!(config.firewall.block_timeout_secs, -1);
        assert_eq!(config.firewall.max_hack_attempts, 5);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: DispatchConfig = toml::from_str(
            r#"
            [firewall]
            max_requests_per_minute = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.firewall.max_requests_per_minute, 120);
        assert_eq!(config.firewall.block_timeout_secs, -1);
        assert_eq!(config.listener, ListenerConfig::default());
        assert_eq!(config.pool.capacity, 1024);
    }
}
