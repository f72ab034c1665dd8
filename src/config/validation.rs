//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Routing rules are NOT checked here; the routing table builder owns their
//!   shape so a bad rule set on reload leaves the published table in place

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// Paths served by the ingress itself.
const RESERVED_PATHS: &[&str] = &["/", "/readyz"];

/// Characters the router reads as capture or wildcard syntax.
const ROUTE_PATTERN_CHARS: &[char] = &['{', '}', '*'];

/// A single semantic problem in the service configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error(
        "listener.webhook_path must be a literal path starting with '/', other than '/' and '/readyz', got '{0}'"
    )]
    WebhookPath(String),
}

/// Check everything the service reads once at startup.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if !is_literal_webhook_path(&config.listener.webhook_path) {
        errors.push(ValidationError::WebhookPath(config.listener.webhook_path.clone()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_body_bytes" });
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "listener.request_timeout_secs" });
    }
    if config.demux.reload_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "demux.reload_interval_secs" });
    }
    if config.dispatch.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "dispatch.timeout_secs" });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A path the router can register as-is, clear of the liveness and
/// readiness routes.
fn is_literal_webhook_path(path: &str) -> bool {
    path.starts_with('/')
        && !RESERVED_PATHS.contains(&path)
        && !path.contains(ROUTE_PATTERN_CHARS)
        && !path.split('/').any(|segment| segment.starts_with(':'))
}
