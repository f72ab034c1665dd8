//! Hot-reloadable webhook event demultiplexer.
//!
//! Answers "which destinations care about this event right now?" for events
//! identified by organization, repository and event type. The answer comes
//! from routing rules that are reloaded from configuration at runtime.

pub mod config;
pub mod dispatch;
pub mod ingress;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::ServiceConfig;
pub use dispatch::Dispatcher;
pub use ingress::{Envelope, EnvelopeError, IngressServer, RawMessage};
pub use lifecycle::Shutdown;
pub use routing::{ConfigShapeError, RoutingAgent, RoutingTable};
