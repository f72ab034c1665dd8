//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Config source (version, rules)
//!     → agent.rs (poll; skip if version unchanged)
//!     → table.rs (build candidate RoutingTable off to the side)
//!     → agent.rs (atomic swap of Arc<RoutingTable>)
//!
//! Lookup:
//!     resolve(org, repo, event)
//!     → inclusion["org/repo"] or inclusion["org"]
//!     → minus exclusion["org/repo"]
//!     → Vec<String> owned by the caller
//! ```
//!
//! # Design Decisions
//! - Tables are immutable once published
//! - A bad rule set rejects the whole candidate; the old table keeps serving
//! - Unknown scopes and events resolve to an empty list, not an error

pub mod agent;
pub mod error;
pub mod table;

pub use agent::{AgentStatus, ReloadOutcome, RoutingAgent, DEFAULT_RELOAD_INTERVAL};
pub use error::ConfigShapeError;
pub use table::{repo_key, EventSet, EventsDemux, RoutingKey, RoutingTable, RoutingTableBuilder};
