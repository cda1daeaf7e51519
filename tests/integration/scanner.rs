//! Integration tests for stream sessions, the supervisor and the runtime

use std::sync::Arc;
use std::time::Duration;

use breakwatch::config::ScannerConfig;
use breakwatch::core::runtime::ScannerRuntime;
use breakwatch::core::session::{SessionState, StreamSession};
use breakwatch::core::supervisor::SessionSupervisor;
use breakwatch::error::{SessionError, TransportError};
use breakwatch::metrics::Metrics;
use breakwatch::models::BreakoutDirection;
use breakwatch::services::sinks::{MemoryAlertSink, MemorySnapshotStore};
use breakwatch::services::{MockFeed, MockFrame};
use tokio::sync::watch;

use crate::test_utils::{
    eventually, kline_frame, memory_dispatcher, provider_for, session_config, wait_for_state,
    PendingProvider, StalledFeed,
};

#[tokio::test]
async fn session_streams_and_dispatches_breakouts() {
    let sinks = memory_dispatcher();
    let feed = MockFeed::new();
    let frames = feed.subscription("BTCUSDT").await;

    let (session, mut state) = StreamSession::new(
        "BTCUSDT",
        &session_config(),
        Arc::new(provider_for(&["BTCUSDT"])),
        Arc::new(feed.clone()),
        sinks.dispatcher.handle(),
        None,
    );
    let series = session.series();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(session.run(shutdown_rx));

    wait_for_state(&mut state, |s| *s == SessionState::Streaming).await;
    assert_eq!(series.len(), 20);

    frames.send(MockFrame::Text(kline_frame("BTCUSDT", 20, 101.0, 90.0, 101.0))).unwrap();
    frames.send(MockFrame::Text(kline_frame("BTCUSDT", 21, 100.0, 89.0, 89.0))).unwrap();
    frames.send(MockFrame::Text(kline_frame("BTCUSDT", 22, 100.0, 90.0, 95.0))).unwrap();
    frames.send(MockFrame::Close).unwrap();

    assert_eq!(task.await.unwrap(), SessionState::Closed);
    assert_eq!(*state.borrow(), SessionState::Closed);

    let stats = sinks.dispatcher.shutdown(Duration::from_secs(1)).await;
    assert_eq!(stats.delivered, 3);

    let mut snapshots = sinks.store.snapshots().await;
    snapshots.sort_by_key(|s| s.sequence);
    let sequences: Vec<u64> = snapshots.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![21, 22, 23]);

    let mut directions: Vec<BreakoutDirection> = sinks
        .alerts
        .events()
        .await
        .iter()
        .map(|e| e.direction)
        .collect();
    directions.sort_by_key(|d| d.as_str());
    assert_eq!(directions, vec![BreakoutDirection::Down, BreakoutDirection::Up]);
}

#[tokio::test]
async fn session_skips_undecodable_messages() {
    let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
    let sinks = memory_dispatcher();
    let feed = MockFeed::new();
    let frames = feed.subscription("BTCUSDT").await;

    let (session, _state) = StreamSession::new(
        "BTCUSDT",
        &session_config(),
        Arc::new(provider_for(&["BTCUSDT"])),
        Arc::new(feed.clone()),
        sinks.dispatcher.handle(),
        Some(metrics.clone()),
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(session.run(shutdown_rx));

    frames.send(MockFrame::Text("garbage".to_string())).unwrap();
    frames.send(MockFrame::Text(r#"{"result":null,"id":1}"#.to_string())).unwrap();
    frames.send(MockFrame::Text(kline_frame("ETHUSDT", 20, 10.0, 9.0, 9.5))).unwrap();
    frames.send(MockFrame::Text(kline_frame("BTCUSDT", 5, 100.0, 90.0, 95.0))).unwrap();
    frames.send(MockFrame::Text(kline_frame("BTCUSDT", 20, 100.0, 90.0, 95.0))).unwrap();
    frames.send(MockFrame::Close).unwrap();

    assert_eq!(task.await.unwrap(), SessionState::Closed);
    sinks.dispatcher.shutdown(Duration::from_secs(1)).await;

    assert_eq!(sinks.store.len().await, 1);
    assert_eq!(metrics.decode_errors_total.get(), 2);
    assert_eq!(metrics.dropped_candles_total.get(), 1);
    assert_eq!(metrics.candles_ingested_total.get(), 1);
    assert_eq!(metrics.sessions_closed_total.get(), 1);
    assert_eq!(metrics.sessions_running.get(), 0);
}

#[tokio::test]
async fn session_fails_on_transport_error() {
    let sinks = memory_dispatcher();
    let feed = MockFeed::new();
    let frames = feed.subscription("BTCUSDT").await;

    let (session, _state) = StreamSession::new(
        "BTCUSDT",
        &session_config(),
        Arc::new(provider_for(&["BTCUSDT"])),
        Arc::new(feed.clone()),
        sinks.dispatcher.handle(),
        None,
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    frames.send(MockFrame::Error("connection reset".to_string())).unwrap();

    let terminal = session.run(shutdown_rx).await;
    assert_eq!(
        terminal,
        SessionState::Failed(SessionError::Transport(TransportError::Read(
            "connection reset".to_string()
        )))
    );
    assert_eq!(feed.closes().await, vec!["BTCUSDT".to_string()]);
    assert!(feed.connects().await.contains(&"BTCUSDT".to_string()));
}

#[tokio::test]
async fn session_fails_when_feed_refuses_connection() {
    let sinks = memory_dispatcher();
    let (session, _state) = StreamSession::new(
        "BTCUSDT",
        &session_config(),
        Arc::new(provider_for(&["BTCUSDT"])),
        Arc::new(MockFeed::new()),
        sinks.dispatcher.handle(),
        None,
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let terminal = session.run(shutdown_rx).await;
    assert!(matches!(
        terminal,
        SessionState::Failed(SessionError::Transport(TransportError::Connect { .. }))
    ));
}

#[tokio::test]
async fn dropped_session_reports_aborted() {
    let sinks = memory_dispatcher();
    let (session, state) = StreamSession::new(
        "BTCUSDT",
        &session_config(),
        Arc::new(provider_for(&["BTCUSDT"])),
        Arc::new(MockFeed::new()),
        sinks.dispatcher.handle(),
        None,
    );
    assert_eq!(*state.borrow(), SessionState::Created);

    drop(session);
    assert_eq!(
        *state.borrow(),
        SessionState::Failed(SessionError::Aborted)
    );
}

#[tokio::test]
async fn shutdown_during_backfill_closes_session() {
    let sinks = memory_dispatcher();
    let (session, mut state) = StreamSession::new(
        "BTCUSDT",
        &session_config(),
        Arc::new(PendingProvider),
        Arc::new(MockFeed::new()),
        sinks.dispatcher.handle(),
        None,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(session.run(shutdown_rx));

    wait_for_state(&mut state, |s| *s == SessionState::Backfilling).await;
    shutdown_tx.send_replace(true);

    let terminal = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("session stops promptly")
        .unwrap();
    assert_eq!(terminal, SessionState::Closed);
}

#[tokio::test]
async fn shutdown_during_connect_closes_session() {
    let sinks = memory_dispatcher();
    let (session, mut state) = StreamSession::new(
        "BTCUSDT",
        &session_config(),
        Arc::new(provider_for(&["BTCUSDT"])),
        Arc::new(StalledFeed { connect_hangs: true }),
        sinks.dispatcher.handle(),
        None,
    );
    let series = session.series();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(session.run(shutdown_rx));

    wait_for_state(&mut state, |s| *s == SessionState::Connecting).await;
    assert_eq!(series.len(), 20);
    shutdown_tx.send_replace(true);

    let terminal = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("session stops promptly")
        .unwrap();
    assert_eq!(terminal, SessionState::Closed);
    assert_eq!(*state.borrow(), SessionState::Closed);
}

#[tokio::test]
async fn supervisor_aborts_sessions_that_outlive_grace() {
    let sinks = memory_dispatcher();
    let handle = SessionSupervisor::new(
        Arc::new(provider_for(&["ETHUSDT"])),
        Arc::new(StalledFeed { connect_hangs: false }),
        sinks.dispatcher.handle(),
        session_config(),
        None,
    )
    .start(vec!["ETHUSDT".to_string()]);
    let registry = handle.registry();
    eventually(|| {
        let registry = registry.clone();
        async move { registry.state("ETHUSDT") == Some(SessionState::Streaming) }
    })
    .await;

    // closing the stalled connection never completes
    let status = tokio::time::timeout(
        Duration::from_secs(2),
        handle.shutdown(Duration::from_millis(50)),
    )
    .await
    .expect("aborted within grace plus drain");

    assert_eq!(status.failed, 1);
    assert_eq!(status.closed, 0);
    assert_eq!(
        registry.state("ETHUSDT"),
        Some(SessionState::Failed(SessionError::Aborted))
    );
    assert_eq!(
        status.sessions["ETHUSDT"].reason.as_deref(),
        Some(SessionError::Aborted.to_string().as_str())
    );
}

#[tokio::test]
async fn supervisor_isolates_backfill_failure() {
    let sinks = memory_dispatcher();
    let feed = MockFeed::new();
    let btc = feed.subscription("BTCUSDT").await;
    let provider = provider_for(&["BTCUSDT"]).with_failure("ETHUSDT", "bad rows");

    let supervisor = SessionSupervisor::new(
        Arc::new(provider),
        Arc::new(feed.clone()),
        sinks.dispatcher.handle(),
        session_config(),
        None,
    );
    let mut handle = supervisor.start(vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BTCUSDT".to_string(),
    ]);
    let registry = handle.registry();
    assert_eq!(registry.len(), 2);

    let mut eth_state = registry_state(&registry, "ETHUSDT").await;
    assert!(matches!(eth_state, SessionState::Failed(SessionError::Backfill(_))));

    eventually(|| {
        let registry = registry.clone();
        async move { registry.state("BTCUSDT") == Some(SessionState::Streaming) }
    })
    .await;
    btc.send(MockFrame::Text(kline_frame("BTCUSDT", 20, 100.0, 90.0, 95.0))).unwrap();
    btc.send(MockFrame::Close).unwrap();
    handle.wait().await;

    let status = handle.status();
    assert_eq!(status.closed, 1);
    assert_eq!(status.failed, 1);
    assert_eq!(status.running, 0);
    assert!(status.all_terminal());
    assert_eq!(status.sessions["BTCUSDT"].state, "closed");
    eth_state = registry.state("ETHUSDT").unwrap();
    assert_eq!(
        status.sessions["ETHUSDT"].reason.as_deref(),
        eth_state.failure().map(|e| e.to_string()).as_deref()
    );

    sinks.dispatcher.shutdown(Duration::from_secs(1)).await;
    assert_eq!(sinks.store.len().await, 1);
}

async fn registry_state(
    registry: &breakwatch::core::supervisor::SessionRegistry,
    symbol: &str,
) -> SessionState {
    let mut state = None;
    eventually(|| {
        let current = registry.state(symbol);
        let done = current.as_ref().map(|s| s.is_terminal()).unwrap_or(false);
        state = current;
        async move { done }
    })
    .await;
    state.expect("session registered")
}

#[tokio::test]
async fn shutdown_mid_stream_stops_all_writes() {
    let sinks = memory_dispatcher();
    let feed = MockFeed::new();
    let btc = feed.subscription("BTCUSDT").await;
    let eth = feed.subscription("ETHUSDT").await;

    let handle = SessionSupervisor::new(
        Arc::new(provider_for(&["BTCUSDT", "ETHUSDT"])),
        Arc::new(feed.clone()),
        sinks.dispatcher.handle(),
        session_config(),
        None,
    )
    .start(vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);

    btc.send(MockFrame::Text(kline_frame("BTCUSDT", 20, 100.0, 90.0, 95.0))).unwrap();
    eth.send(MockFrame::Text(kline_frame("ETHUSDT", 20, 100.0, 90.0, 95.0))).unwrap();
    let store = sinks.store.clone();
    eventually(|| {
        let store = store.clone();
        async move { store.len().await == 2 }
    })
    .await;

    let status = tokio::time::timeout(Duration::from_secs(2), handle.shutdown(Duration::from_secs(1)))
        .await
        .expect("sessions stop within grace");
    assert_eq!(status.closed, 2);
    assert_eq!(status.failed, 0);

    let mut closed = feed.closes().await;
    closed.sort();
    assert_eq!(closed, vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);

    sinks.dispatcher.shutdown(Duration::from_secs(1)).await;
    let persisted = sinks.store.len().await;

    let _ = btc.send(MockFrame::Text(kline_frame("BTCUSDT", 21, 120.0, 90.0, 120.0)));
    let _ = eth.send(MockFrame::Text(kline_frame("ETHUSDT", 21, 100.0, 80.0, 80.0)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sinks.store.len().await, persisted);
    assert!(sinks.alerts.events().await.is_empty());
}

#[tokio::test]
async fn runtime_resolves_catalog_and_shuts_down_in_order() {
    let feed = MockFeed::new();
    let _btc = feed.subscription("BTCUSDT").await;
    let _eth = feed.subscription("ETHUSDT").await;
    let store = MemorySnapshotStore::new();

    let config = ScannerConfig {
        symbols: None,
        shutdown_grace: Duration::from_secs(1),
        ..ScannerConfig::default()
    };
    let mut runtime = ScannerRuntime::new(
        config,
        Arc::new(provider_for(&["BTCUSDT", "ETHUSDT"])),
        Arc::new(feed.clone()),
        Arc::new(store.clone()),
        Arc::new(MemoryAlertSink::new()),
        None,
    );

    let symbols = runtime.resolve_symbols().await.unwrap();
    assert_eq!(symbols, vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);

    let registry = runtime.start(symbols);
    eventually(|| {
        let registry = registry.clone();
        async move { registry.status().sessions.values().all(|s| s.state == "streaming") }
    })
    .await;

    let report = runtime.shutdown().await.expect("runtime was started");
    assert_eq!(report.sessions.closed, 2);
    assert_eq!(report.dispatch.dropped, 0);
}

#[tokio::test]
async fn runtime_prefers_configured_symbols() {
    let config = ScannerConfig {
        symbols: Some(vec!["SOLUSDT".to_string()]),
        ..ScannerConfig::default()
    };
    let runtime = ScannerRuntime::new(
        config,
        Arc::new(provider_for(&["BTCUSDT"])),
        Arc::new(MockFeed::new()),
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(MemoryAlertSink::new()),
        None,
    );
    assert_eq!(
        runtime.resolve_symbols().await.unwrap(),
        vec!["SOLUSDT".to_string()]
    );
    assert!(runtime.shutdown().await.is_none());
}
