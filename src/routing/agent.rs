//! Routing agent: owns the published routing table.
//!
//! # Responsibilities
//! - Poll the config source on a fixed interval
//! - Rebuild the table when the version token changes
//! - Publish new tables atomically; serve lookups concurrently
//!
//! # Design Decisions
//! - Tables are built off to the side; the swap is the only exclusive step
//! - Readers take an `ArcSwap` snapshot and copy out, never holding a lock
//! - Reloads are serialized by the mutex that guards the last-applied version
//! - Fail-static: a rejected config is logged and the old table keeps serving

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::source::{ConfigSource, ConfigVersion};
use crate::observability::metrics;
use crate::routing::error::ConfigShapeError;
use crate::routing::table::{EventsDemux, RoutingTable};

/// Default polling period for the config source.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(60);

/// Result of a successful `reload()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The source still reports the last-applied version.
    Unchanged,
    /// A new table was built and published.
    Applied(ConfigVersion),
}

/// Point-in-time view of the agent, used for readiness reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AgentStatus {
    /// Last applied version, `None` until the first successful reload.
    pub version: Option<String>,
    /// Error from the most recent reload attempt, cleared on success.
    pub last_error: Option<String>,
    /// Whether the periodic reload timer is armed.
    pub running: bool,
    /// Routing keys in the published table.
    pub routing_keys: usize,
}

#[derive(Default)]
struct ReloadState {
    version: Option<ConfigVersion>,
    last_error: Option<String>,
}

struct ReloadTask {
    stop_tx: broadcast::Sender<()>,
    _handle: JoinHandle<()>,
}

/// Hot-reloadable event demultiplexer.
pub struct RoutingAgent {
    source: Arc<dyn ConfigSource>,
    interval: Duration,
    table: ArcSwap<RoutingTable>,
    state: Mutex<ReloadState>,
    task: Mutex<Option<ReloadTask>>,
}

impl RoutingAgent {
    /// Create an agent with an empty table. Nothing is loaded until
    /// `reload()` or `start()`.
    pub fn new(source: Arc<dyn ConfigSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            table: ArcSwap::from_pointee(RoutingTable::new()),
            state: Mutex::new(ReloadState::default()),
            task: Mutex::new(None),
        }
    }

    /// Pull the latest snapshot and publish a new table if its version changed.
    ///
    /// On error the published table and the last-applied version are left
    /// untouched, so the same snapshot is retried on the next tick.
    pub fn reload(&self) -> Result<ReloadOutcome, ConfigShapeError> {
        let mut state = lock(&self.state);

        let snapshot = self.source.snapshot();
        if state.version.as_ref() == Some(&snapshot.version) {
            metrics::record_reload("unchanged");
            return Ok(ReloadOutcome::Unchanged);
        }

        let built = snapshot
            .rules
            .as_deref()
            .ok_or(ConfigShapeError::MissingDocument)
            .and_then(RoutingTable::build);

        match built {
            Ok(table) => {
                let keys = table.key_count();
                state.version = Some(snapshot.version.clone());
                state.last_error = None;

                self.table.store(Arc::new(table));

                metrics::record_reload("applied");
                metrics::record_routing_keys(keys);
                tracing::info!(version = %snapshot.version, routing_keys = keys, "Routing table published");
                Ok(ReloadOutcome::Applied(snapshot.version.clone()))
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                metrics::record_reload("rejected");
                tracing::error!(
                    version = %snapshot.version,
                    error = %e,
                    "Rejected routing config, keeping current table"
                );
                Err(e)
            }
        }
    }

    /// Reload once right away, then every `interval` until `stop()`.
    ///
    /// Must be called inside a Tokio runtime. Calling it while already
    /// running does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut task = lock(&self.task);
        if task.is_some() {
            tracing::warn!("Routing agent already started");
            return;
        }

        // Errors are logged inside reload; the agent still arms its timer.
        let _ = self.reload();

        let (stop_tx, mut stop_rx) = broadcast::channel(1);
        let agent: Weak<Self> = Arc::downgrade(self);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(agent) = agent.upgrade() else { break };
                        let _ = agent.reload();
                    }
                    _ = stop_rx.recv() => {
                        tracing::debug!("Routing agent timer stopped");
                        break;
                    }
                }
            }
        });

        tracing::info!(interval_secs = period.as_secs_f64(), "Routing agent started");
        *task = Some(ReloadTask {
            stop_tx,
            _handle: handle,
        });
    }

    /// Cancel the periodic reload. Safe to call repeatedly or before `start()`.
    ///
    /// A reload already executing is allowed to finish.
    pub fn stop(&self) {
        if let Some(task) = lock(&self.task).take() {
            let _ = task.stop_tx.send(());
            tracing::info!("Routing agent stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task).is_some()
    }

    /// Destinations interested in `event` from `org/repo`, sorted.
    ///
    /// Never blocks on a reload and never returns a view into the table.
    pub fn resolve(&self, org: &str, repo: &str, event: &str) -> Vec<String> {
        let destinations = self.table.load().destinations(org, repo, event);
        metrics::record_resolve(!destinations.is_empty());
        destinations
    }

    /// Full event → destinations view for a repository.
    pub fn events_for(&self, org: &str, repo: &str) -> EventsDemux {
        self.table.load().events_for(org, repo)
    }

    /// Handle to the currently published table.
    pub fn table(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    /// Last applied version token.
    pub fn version(&self) -> Option<ConfigVersion> {
        lock(&self.state).version.clone()
    }

    pub fn status(&self) -> AgentStatus {
        let (version, last_error) = {
            let state = lock(&self.state);
            (
                state.version.as_ref().map(ToString::to_string),
                state.last_error.clone(),
            )
        };

        AgentStatus {
            version,
            last_error,
            running: self.is_running(),
            routing_keys: self.table.load().key_count(),
        }
    }
}

impl Drop for RoutingAgent {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
