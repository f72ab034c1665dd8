//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → stop routing agent timer → drop config watcher
//!     → stop accepting webhooks → drain in-flight dispatches → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - `Shutdown` owns the agent, watcher and dispatcher handles, so the order
//!   lives in one place rather than in each binary
//! - The agent stops before its config source is torn down
//! - Draining has a deadline: dispatches still running after it are abandoned

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownReport};
pub use signals::wait_for_signal;
