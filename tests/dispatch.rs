//! Dispatch tests against mock destinations.

use std::sync::Arc;
use std::time::Duration;

use event_demux::config::{DemuxConfig, DispatchConfig, MemorySource, RuleConfig};
use event_demux::dispatch::{DispatchError, Dispatcher};
use event_demux::ingress::envelope::{EVENT_TYPE_HEADER, TIMESTAMP_HEADER};
use event_demux::routing::{RoutingAgent, DEFAULT_RELOAD_INTERVAL};

mod common;

fn dispatcher_for(rules: Vec<RuleConfig>) -> (Dispatcher, Arc<MemorySource>) {
    let source = Arc::new(MemorySource::with_rules(DemuxConfig {
        rules,
        ..DemuxConfig::default()
    }));
    let agent = Arc::new(RoutingAgent::new(source.clone(), DEFAULT_RELOAD_INTERVAL));
    agent.reload().unwrap();

    let config = DispatchConfig {
        timeout_secs: 2,
        ..DispatchConfig::default()
    };
    (Dispatcher::new(agent, &config).unwrap(), source)
}

#[tokio::test]
async fn test_delivers_to_every_destination() {
    let a = common::start_mock_destination(200).await;
    let b = common::start_mock_destination(200).await;

    let (dispatcher, _) = dispatcher_for(vec![
        RuleConfig::new("org").event("Push Hook", [a.url("/hook"), b.url("/hook")]),
    ]);

    let envelope = common::envelope("org", "repo", "Push Hook");
    let report = dispatcher.dispatch(&envelope).await.unwrap();

    assert_eq!(report.org, "org");
    assert_eq!(report.repo, "repo");
    assert_eq!(report.delivered.len(), 2);
    assert!(report.failed.is_empty());

    for destination in [&a, &b] {
        let received = destination.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].path, "/hook");
        assert_eq!(received[0].body, envelope.payload());
        assert_eq!(received[0].headers[&EVENT_TYPE_HEADER.to_ascii_lowercase()], "Push Hook");
        assert_eq!(received[0].headers[&TIMESTAMP_HEADER.to_ascii_lowercase()], "1700000000000");
        assert_eq!(received[0].headers["user-agent"], "Robot-Gitee-Access");
    }
}

#[tokio::test]
async fn test_excluded_destination_not_called() {
    let a = common::start_mock_destination(200).await;
    let b = common::start_mock_destination(200).await;

    let (dispatcher, _) = dispatcher_for(vec![RuleConfig::new("org")
        .event("Push Hook", [a.url("/"), b.url("/")])
        .exclude("org/quiet", "Push Hook", [a.url("/")])]);

    let report = dispatcher
        .dispatch(&common::envelope("org", "quiet", "Push Hook"))
        .await
        .unwrap();
    assert_eq!(report.delivered, vec![b.url("/")]);
    assert!(a.received().is_empty());

    dispatcher
        .dispatch(&common::envelope("org", "loud", "Push Hook"))
        .await
        .unwrap();
    assert_eq!(a.received().len(), 1);
    assert_eq!(b.received().len(), 2);
}

#[tokio::test]
async fn test_no_destinations_drops_silently() {
    let (dispatcher, _) = dispatcher_for(vec![RuleConfig::new("other").event("Push Hook", ["http://127.0.0.1:1/"])]);

    let report = dispatcher
        .dispatch(&common::envelope("org", "repo", "Push Hook"))
        .await
        .unwrap();
    assert!(report.is_dropped());
}

#[tokio::test]
async fn test_failed_destination_does_not_block_others() {
    let good = common::start_mock_destination(200).await;
    let bad = common::start_mock_destination(503).await;

    let (dispatcher, _) = dispatcher_for(vec![
        RuleConfig::new("org/repo").event("Note Hook", [good.url("/"), bad.url("/")]),
    ]);

    let report = dispatcher
        .dispatch(&common::envelope("org", "repo", "Note Hook"))
        .await
        .unwrap();
    assert_eq!(report.delivered, vec![good.url("/")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, bad.url("/"));
    // No retries.
    assert_eq!(bad.received().len(), 1);
}

#[tokio::test]
async fn test_payload_without_repository_is_an_error() {
    let (dispatcher, _) = dispatcher_for(vec![]);
    let message = event_demux::RawMessage::new(br#"{"action":"ping"}"#.to_vec())
        .with_header("User-Agent", "Robot-Gitee-Access")
        .with_header(EVENT_TYPE_HEADER, "Push Hook")
        .with_header(TIMESTAMP_HEADER, "1");
    let envelope = event_demux::ingress::validate(message).unwrap();

    let err = dispatcher.dispatch(&envelope).await.unwrap_err();
    assert!(matches!(err, DispatchError::MissingRepository));
}

#[tokio::test]
async fn test_routing_follows_reload() {
    let first = common::start_mock_destination(200).await;
    let second = common::start_mock_destination(200).await;

    let (dispatcher, source) = dispatcher_for(vec![
        RuleConfig::new("org").event("Push Hook", [first.url("/")]),
    ]);
    dispatcher
        .dispatch(&common::envelope("org", "repo", "Push Hook"))
        .await
        .unwrap();

    source.publish(DemuxConfig {
        rules: vec![RuleConfig::new("org").event("Push Hook", [second.url("/")])],
        ..DemuxConfig::default()
    });
    dispatcher.agent().reload().unwrap();
    dispatcher
        .dispatch(&common::envelope("org", "repo", "Push Hook"))
        .await
        .unwrap();

    assert_eq!(first.received().len(), 1);
    assert_eq!(second.received().len(), 1);
}

#[tokio::test]
async fn test_spawned_dispatches_are_drained() {
    let destination = common::start_mock_destination(200).await;
    let (dispatcher, _) = dispatcher_for(vec![
        RuleConfig::new("org").event("Push Hook", [destination.url("/")]),
    ]);

    for _ in 0..5 {
        dispatcher.spawn(common::envelope("org", "repo", "Push Hook"));
    }
    assert!(dispatcher.wait_timeout(Duration::from_secs(5)).await);
    assert_eq!(dispatcher.in_flight(), 0);
    assert_eq!(destination.received().len(), 5);
}
