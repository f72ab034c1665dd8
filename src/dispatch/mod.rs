//! Dispatch boundary.
//!
//! # Data Flow
//! ```text
//! Envelope (validated)
//!     → payload.rs (org, repo from the JSON body)
//!     → RoutingAgent::resolve(org, repo, event type)
//!     → HTTP POST to every destination, concurrently
//!     → DispatchReport
//! ```
//!
//! # Design Decisions
//! - No retries and no durability; a failed delivery is logged and counted
//! - An empty resolution is dropped silently
//! - In-flight dispatches are tracked so shutdown can drain them

pub mod payload;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::Notify;

use crate::config::DispatchConfig;
use crate::ingress::envelope::{
    Envelope, EVENT_TYPE_HEADER, EXPECTED_USER_AGENT, TIMESTAMP_HEADER,
};
use crate::observability::metrics;
use crate::routing::RoutingAgent;

pub use payload::extract_repository;

/// Errors that stop an envelope from being routed at all.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("payload does not name a repository")]
    MissingRepository,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// What happened to one envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub org: String,
    pub repo: String,
    pub delivered: Vec<String>,
    /// Destination and error text.
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    /// Nothing was interested in the event.
    pub fn is_dropped(&self) -> bool {
        self.delivered.is_empty() && self.failed.is_empty()
    }
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(self.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Delivers validated envelopes to the destinations the agent resolves.
#[derive(Clone)]
pub struct Dispatcher {
    agent: Arc<RoutingAgent>,
    client: reqwest::Client,
    in_flight: Arc<InFlight>,
}

impl Dispatcher {
    pub fn new(agent: Arc<RoutingAgent>, config: &DispatchConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            agent,
            client,
            in_flight: Arc::new(InFlight::default()),
        })
    }

    pub fn agent(&self) -> &Arc<RoutingAgent> {
        &self.agent
    }

    /// Route and deliver one envelope, waiting for every destination.
    pub async fn dispatch(&self, envelope: &Envelope) -> Result<DispatchReport, DispatchError> {
        let _guard = self.in_flight.enter();
        self.route(envelope).await
    }

    /// Dispatch in the background. Counted as in flight from the moment of
    /// the call, so `wait` covers it.
    pub fn spawn(&self, envelope: Envelope) {
        let guard = self.in_flight.enter();
        let dispatcher = self.clone();

        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = dispatcher.route(&envelope).await {
                tracing::warn!(
                    event = %envelope.event_type(),
                    token = %envelope.dedupe_token(),
                    error = %e,
                    "Dropping undeliverable event"
                );
            }
        });
    }

    /// Dispatches that have started and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until no dispatch is in flight.
    pub async fn wait(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Like `wait`, bounded. Returns false if dispatches were still running.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }

    async fn route(&self, envelope: &Envelope) -> Result<DispatchReport, DispatchError> {
        let (org, repo) = extract_repository(envelope.payload())?;
        let destinations = self.agent.resolve(&org, &repo, envelope.event_type());

        let mut report = DispatchReport {
            org,
            repo,
            ..DispatchReport::default()
        };

        if destinations.is_empty() {
            tracing::debug!(
                org = %report.org,
                repo = %report.repo,
                event = %envelope.event_type(),
                "No destinations interested, dropping"
            );
            metrics::record_dropped();
            return Ok(report);
        }

        let results = join_all(
            destinations
                .iter()
                .map(|destination| self.deliver(destination, envelope)),
        )
        .await;

        for (destination, result) in destinations.into_iter().zip(results) {
            match result {
                Ok(()) => report.delivered.push(destination),
                Err(e) => report.failed.push((destination, e.to_string())),
            }
        }

        tracing::info!(
            org = %report.org,
            repo = %report.repo,
            event = %envelope.event_type(),
            token = %envelope.dedupe_token(),
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Event dispatched"
        );
        Ok(report)
    }

    async fn deliver(&self, destination: &str, envelope: &Envelope) -> Result<(), reqwest::Error> {
        let start = Instant::now();
        let result = self
            .client
            .post(destination)
            .header(reqwest::header::USER_AGENT, EXPECTED_USER_AGENT)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_TYPE_HEADER, envelope.event_type())
            .header(TIMESTAMP_HEADER, envelope.dedupe_token())
            .body(envelope.payload().to_vec())
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => {
                metrics::record_delivery("delivered", start);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(destination = %destination, error = %e, "Delivery failed");
                metrics::record_delivery("failed", start);
                Err(e)
            }
        }
    }
}
