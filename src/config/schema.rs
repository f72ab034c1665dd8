//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the demux
//! service. All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the demux service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Webhook listener configuration.
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Routing rules and reload cadence.
    pub demux: DemuxConfig,

    /// Outbound delivery settings.
    pub dispatch: DispatchConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8888").
    pub bind_address: String,

    /// Path that accepts inbound webhook messages.
    pub webhook_path: String,

    /// Largest accepted message body in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8888".to_string(),
            webhook_path: "/webhook".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 30,
        }
    }
}

/// Routing configuration. The `rules` are the hot-reloadable part of the file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DemuxConfig {
    /// How often the routing agent polls its config source, in seconds.
    pub reload_interval_secs: u64,

    /// Routing rule entries.
    pub rules: Vec<RuleConfig>,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            reload_interval_secs: 60,
            rules: Vec::new(),
        }
    }
}

/// Event type name → destination identifiers.
pub type EventDestinations = BTreeMap<String, Vec<String>>;

/// One routing rule.
///
/// ```toml
/// [[demux.rules]]
/// key = "openeuler"
/// events = { push = ["http://ci/hook", "http://bot/hook"] }
/// exclude = { "openeuler/kernel" = { push = ["http://bot/hook"] } }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RuleConfig {
    /// Routing key: `"org"` or `"org/repo"`.
    pub key: String,

    /// Destinations interested in each event type.
    #[serde(default)]
    pub events: EventDestinations,

    /// Per-repository opt-outs, keyed by `"org/repo"`.
    #[serde(default)]
    pub exclude: BTreeMap<String, EventDestinations>,
}

impl RuleConfig {
    /// Create a rule with inclusion entries only.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            events: BTreeMap::new(),
            exclude: BTreeMap::new(),
        }
    }

    /// Add destinations for an event type.
    pub fn event<I, S>(mut self, event: impl Into<String>, destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events
            .entry(event.into())
            .or_default()
            .extend(destinations.into_iter().map(Into::into));
        self
    }

    /// Exclude destinations for an event type in one repository.
    pub fn exclude<I, S>(
        mut self,
        repo_key: impl Into<String>,
        event: impl Into<String>,
        destinations: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude
            .entry(repo_key.into())
            .or_default()
            .entry(event.into())
            .or_default()
            .extend(destinations.into_iter().map(Into::into));
        self
    }
}

/// Outbound delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-destination request timeout in seconds.
    pub timeout_secs: u64,

    /// How long shutdown waits for in-flight deliveries, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            drain_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.demux.reload_interval_secs, 60);
        assert_eq!(config.listener.webhook_path, "/webhook");
    }

    #[test]
    fn test_rules_deserialize() {
        let raw = r#"
            [[demux.rules]]
            key = "org"
            events = { push = ["a", "b"] }
            exclude = { "org/repo1" = { push = ["a"] } }

            [[demux.rules]]
            key = "org/repo2"
            [demux.rules.events]
            note = ["c"]
        "#;
        let config: ServiceConfig = toml::from_str(raw).unwrap();
        let rules = &config.demux.rules;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], RuleConfig::new("org").event("push", ["a", "b"]).exclude("org/repo1", "push", ["a"]));
        assert_eq!(rules[1].events["note"], vec!["c".to_string()]);
        assert!(rules[1].exclude.is_empty());
    }

    #[test]
    fn test_log_format_lowercase() {
        let config: ServiceConfig = toml::from_str("[observability]\nlog_format = \"json\"").unwrap();
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
