//! File-backed config source with hot reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::{load_config, parse_config, ConfigError, LoadedConfig};
use crate::config::source::{ConfigSnapshot, ConfigSource};

struct Inner {
    path: PathBuf,
    current: ArcSwap<ConfigSnapshot>,
}

/// A config source that monitors the configuration file for changes.
///
/// The file is re-read when the watcher reports a change (or on `refresh`).
/// A file that fails to load is logged and the previous snapshot is kept.
/// A blank file on reload is treated as a rewrite caught mid-way (truncated,
/// not yet written) and also keeps the previous snapshot; to route nothing,
/// publish a file that still says so, e.g. an empty `[demux]` table.
#[derive(Clone)]
pub struct FileConfigSource {
    inner: Arc<Inner>,
}

impl FileConfigSource {
    /// Load the file once. Startup fails if the initial load fails.
    pub fn open(path: &Path) -> Result<(Self, LoadedConfig), ConfigError> {
        let loaded = load_config(path)?;
        let snapshot = ConfigSnapshot::new(loaded.version.clone(), loaded.config.demux.clone());

        let source = Self {
            inner: Arc::new(Inner {
                path: path.to_path_buf(),
                current: ArcSwap::from_pointee(snapshot),
            }),
        };
        Ok((source, loaded))
    }

    /// Re-read the file. Returns whether the version changed.
    pub fn refresh(&self) -> Result<bool, ConfigError> {
        self.inner.refresh()
    }

    /// Start watching the file in a background thread.
    ///
    /// Watching stops when the returned watcher is dropped.
    pub fn watch(&self) -> Result<RecommendedWatcher, notify::Error> {
        let inner = self.inner.clone();
        let file_name = inner.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.paths.is_empty()
                        || event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::info!("Config file change detected, reloading...");
                        if let Err(e) = inner.refresh() {
                            tracing::error!(
                                "Failed to reload config: {}. Keeping current configuration.",
                                e
                            );
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        // Editors often replace the file via rename, so watch the directory.
        let dir = match self.inner.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.inner.path, "Config watcher started");
        Ok(watcher)
    }
}

impl Inner {
    fn refresh(&self) -> Result<bool, ConfigError> {
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = ?self.path, "Config file is blank, waiting for the rewrite to finish");
            return Ok(false);
        }

        let loaded = parse_config(&content)?;
        if self.current.load().version == loaded.version {
            return Ok(false);
        }

        tracing::info!(version = %loaded.version, "Config file loaded");
        self.current.store(Arc::new(ConfigSnapshot::new(
            loaded.version,
            loaded.config.demux,
        )));
        Ok(true)
    }
}

impl ConfigSource for FileConfigSource {
    fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.inner.current.load_full()
    }
}
