//! Ordered teardown of the running service.
//!
//! The steps always run in the same order:
//! 1. stop the routing agent's reload timer
//! 2. drop the config watcher the agent was polling
//! 3. tell the ingress to stop accepting webhooks, and wait for it
//! 4. drain in-flight dispatches, up to a deadline

use std::io;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::dispatch::Dispatcher;
use crate::routing::RoutingAgent;

/// What the teardown managed to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every dispatch finished before the drain deadline.
    pub drained: bool,
    /// Dispatches abandoned at the deadline.
    pub abandoned: usize,
}

/// Owns the pieces that must be torn down in order, and the stop signal the
/// ingress listens on.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    agent: Arc<RoutingAgent>,
    dispatcher: Dispatcher,
    watcher: Option<RecommendedWatcher>,
    drain_timeout: Duration,
}

impl Shutdown {
    pub fn new(dispatcher: Dispatcher, drain_timeout: Duration) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            agent: dispatcher.agent().clone(),
            dispatcher,
            watcher: None,
            drain_timeout,
        }
    }

    /// Hand over the config watcher so it outlives the agent's timer.
    pub fn with_watcher(mut self, watcher: RecommendedWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Receiver that fires when the ingress should stop accepting requests.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Tear everything down.
    ///
    /// `ingress` is the server task if it is still running; pass `None` when
    /// it has already exited.
    pub async fn run(mut self, ingress: Option<JoinHandle<io::Result<()>>>) -> ShutdownReport {
        self.agent.stop();

        if self.watcher.take().is_some() {
            tracing::info!("Config watcher stopped");
        }

        let _ = self.tx.send(());
        if let Some(task) = ingress {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Webhook ingress failed during shutdown"),
                Err(e) => tracing::error!(error = %e, "Webhook ingress task panicked"),
            }
        }

        let drained = self.dispatcher.wait_timeout(self.drain_timeout).await;
        let abandoned = self.dispatcher.in_flight();
        if !drained {
            tracing::warn!(
                in_flight = abandoned,
                "Drain deadline passed, abandoning in-flight dispatches"
            );
        }

        ShutdownReport { drained, abandoned }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::{DemuxConfig, DispatchConfig, MemorySource, RuleConfig};
    use crate::ingress::envelope::{
        validate, RawMessage, EVENT_TYPE_HEADER, EXPECTED_USER_AGENT, TIMESTAMP_HEADER,
        USER_AGENT_HEADER,
    };
    use crate::routing::DEFAULT_RELOAD_INTERVAL;

    fn dispatcher(rules: DemuxConfig) -> Dispatcher {
        let source = Arc::new(MemorySource::with_rules(rules));
        let agent = Arc::new(RoutingAgent::new(source, DEFAULT_RELOAD_INTERVAL));
        agent.start();
        Dispatcher::new(agent, &DispatchConfig::default()).unwrap()
    }

    fn push(org: &str, repo: &str) -> crate::ingress::Envelope {
        let body = format!(r#"{{"repository":{{"namespace":"{org}","path":"{repo}"}}}}"#);
        validate(
            RawMessage::new(body)
                .with_header(USER_AGENT_HEADER, EXPECTED_USER_AGENT)
                .with_header(EVENT_TYPE_HEADER, "Push Hook")
                .with_header(TIMESTAMP_HEADER, "1"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_stops_agent_then_ingress() {
        let dispatcher = dispatcher(DemuxConfig::default());
        let agent = dispatcher.agent().clone();
        let shutdown = Shutdown::new(dispatcher, Duration::from_secs(1));

        let mut stop = shutdown.subscribe();
        let ingress = tokio::spawn(async move {
            let _ = stop.recv().await;
            Ok::<_, io::Error>(())
        });
        assert!(agent.is_running());

        let report = shutdown.run(Some(ingress)).await;
        assert!(!agent.is_running());
        assert_eq!(report, ShutdownReport { drained: true, abandoned: 0 });
    }

    #[tokio::test]
    async fn test_ingress_already_gone() {
        let shutdown = Shutdown::new(dispatcher(DemuxConfig::default()), Duration::from_secs(1));
        assert!(shutdown.run(None).await.drained);
    }

    #[tokio::test]
    async fn test_drain_deadline_abandons_stuck_dispatch() {
        // Accepts connections but never answers.
        let stuck = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let destination = format!("http://{}/hook", stuck.local_addr().unwrap());

        let dispatcher = dispatcher(DemuxConfig {
            rules: vec![RuleConfig::new("org").event("Push Hook", [destination])],
            ..DemuxConfig::default()
        });
        dispatcher.spawn(push("org", "repo"));
        assert_eq!(dispatcher.in_flight(), 1);

        let shutdown = Shutdown::new(dispatcher, Duration::from_millis(100));
        let report = shutdown.run(None).await;
        assert_eq!(report, ShutdownReport { drained: false, abandoned: 1 });
    }
}
