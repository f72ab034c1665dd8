//! Inbound message handling.
//!
//! # Data Flow
//! ```text
//! POST /webhook (headers + body)
//!     → server.rs (HeaderMap → RawMessage)
//!     → envelope.rs (fail-fast validation)
//!     → Envelope → dispatch
//! ```
//!
//! # Design Decisions
//! - Invalid messages are rejected before any routing lookup
//! - The validation error kind is returned to the caller verbatim

pub mod envelope;
pub mod server;

pub use envelope::{validate, Envelope, EnvelopeError, RawMessage};
pub use server::{AppState, IngressServer};
