//! Config sources the routing agent polls.
//!
//! A source hands out its latest snapshot: an opaque version token plus the
//! routing rules that token identifies. Sources never block on readers; the
//! snapshot is published through an atomically swappable cell.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use sha2::{Digest, Sha256};

use crate::config::schema::DemuxConfig;

/// Opaque change-detection token for a configuration snapshot.
///
/// Only equality is meaningful; tokens carry no ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigVersion(String);

impl ConfigVersion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Content hash of raw configuration bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The latest configuration a source knows about.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub version: ConfigVersion,
    /// `None` when the source has no usable document.
    pub rules: Option<Arc<DemuxConfig>>,
}

impl ConfigSnapshot {
    pub fn new(version: ConfigVersion, rules: DemuxConfig) -> Self {
        Self {
            version,
            rules: Some(Arc::new(rules)),
        }
    }

    pub fn empty(version: ConfigVersion) -> Self {
        Self { version, rules: None }
    }
}

/// Anything that can supply the routing agent with configuration.
pub trait ConfigSource: Send + Sync {
    /// Return the latest snapshot. Must be cheap; called on every reload tick.
    fn snapshot(&self) -> Arc<ConfigSnapshot>;
}

/// In-memory config source, replaced wholesale by `publish`.
pub struct MemorySource {
    current: ArcSwap<ConfigSnapshot>,
    counter: AtomicU64,
}

impl MemorySource {
    /// A source with no document yet.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ConfigSnapshot::empty(ConfigVersion::new("mem-0"))),
            counter: AtomicU64::new(0),
        }
    }

    /// A source already holding `rules`.
    pub fn with_rules(rules: DemuxConfig) -> Self {
        let source = Self::new();
        source.publish(rules);
        source
    }

    /// Publish new rules under a fresh version token.
    pub fn publish(&self, rules: DemuxConfig) -> ConfigVersion {
        let version = self.next_version();
        self.current
            .store(Arc::new(ConfigSnapshot::new(version.clone(), rules)));
        version
    }

    /// Publish a new version that carries no document.
    pub fn clear(&self) -> ConfigVersion {
        let version = self.next_version();
        self.current
            .store(Arc::new(ConfigSnapshot::empty(version.clone())));
        version
    }

    fn next_version(&self) -> ConfigVersion {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        ConfigVersion::new(format!("mem-{n}"))
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for MemorySource {
    fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }
}
