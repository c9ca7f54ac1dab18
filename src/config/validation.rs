//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= -1, sizes > 0)
//! - Validate addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::DispatchConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be -1 (disabled) or a non-negative number, got {value}")]
    ThresholdOutOfRange { field: &'static str, value: i64 },

    #[error("{field} is not a valid socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let thresholds = [
        ("firewall.max_requests_per_minute", config.firewall.max_requests_per_minute),
        ("firewall.block_timeout_secs", config.firewall.block_timeout_secs),
        ("firewall.max_hack_attempts", i64::from(config.firewall.max_hack_attempts)),
    ];
    for (field, value) in thresholds {
        if value < -1 {
            errors.push(ValidationError::ThresholdOutOfRange { field, value });
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_body_size" });
    }
    if config.pool.capacity == 0 {
        errors.push(ValidationError::Zero { field: "pool.capacity" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
