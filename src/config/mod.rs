//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, hash into a ConfigVersion)
//!     → validation.rs (semantic checks on service settings)
//!     → ServiceConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → atomic swap of the source's ConfigSnapshot
//!     → routing agent picks it up on its next poll
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Only `[demux]` rules are hot-reloadable; everything else is read at startup
//! - Version tokens are content hashes, compared for equality only

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError, LoadedConfig};
pub use schema::{
    DemuxConfig, DispatchConfig, ListenerConfig, LogFormat, ObservabilityConfig, RuleConfig,
    ServiceConfig,
};
pub use source::{ConfigSnapshot, ConfigSource, ConfigVersion, MemorySource};
pub use watcher::FileConfigSource;
