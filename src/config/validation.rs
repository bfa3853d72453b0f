//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the bootstrap pool is routable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RouterConfig;
use crate::error::RouterError;
use crate::pool::total_weight;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than 0"));
    }

    if config.store.counter_id.is_empty() || config.store.config_id.is_empty() {
        errors.push(ValidationError::new("store", "counter_id and config_id must be set"));
    } else if config.store.counter_id == config.store.config_id {
        errors.push(ValidationError::new(
            "store.counter_id",
            "must differ from store.config_id",
        ));
    }

    let pool = &config.pool;
    if pool.servers.is_empty() {
        errors.push(ValidationError::new("pool.servers", "at least one server is required"));
    }
    if pool.servers.len() != pool.weights.len() {
        errors.push(ValidationError::new(
            "pool.weights",
            format!("{} servers but {} weights", pool.servers.len(), pool.weights.len()),
        ));
    }
    if let Err(RouterError::InvalidConfiguration(message)) = total_weight(&pool.weights) {
        errors.push(ValidationError::new("pool.weights", message));
    }
    let mut seen = HashSet::new();
    for server in &pool.servers {
        if server.is_empty() {
            errors.push(ValidationError::new("pool.servers", "server ids must not be empty"));
        } else if !seen.insert(server.as_str()) {
            errors.push(ValidationError::new("pool.servers", format!("duplicate server '{}'", server)));
        }
    }

    if config.scaling.staleness_timeout_secs == 0 {
        errors.push(ValidationError::new("scaling.staleness_timeout_secs", "must be greater than 0"));
    }
    if config.scaling.retry_base_delay_ms > config.scaling.retry_max_delay_ms {
        errors.push(ValidationError::new(
            "scaling.retry_base_delay_ms",
            "must not exceed scaling.retry_max_delay_ms",
        ));
    }
    if config.scaling.variant_name.is_empty() {
        errors.push(ValidationError::new("scaling.variant_name", "must not be empty"));
    }

    if let Some(url) = &config.control_plane.url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "control_plane.url",
                format!("'{}' must start with http:// or https://", url),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&RouterConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = RouterConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.pool.weights = vec![0, 0];
        config.scaling.staleness_timeout_secs = 0;
        config.control_plane.url = Some("ftp://control".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "pool.weights",
                "pool.weights",
                "scaling.staleness_timeout_secs",
                "control_plane.url",
            ]
        );
    }

    #[test]
    fn test_duplicate_servers_rejected() {
        let mut config = RouterConfig::default();
        config.pool.servers = vec!["a".into(), "a".into()];
        config.pool.weights = vec![1, 1];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "pool.servers: duplicate server 'a'");
    }

    #[test]
    fn test_store_keys_must_differ() {
        let mut config = RouterConfig::default();
        config.store.counter_id = "shared".into();
        config.store.config_id = "shared".into();
        assert!(validate_config(&config).is_err());
    }
}
