//! Integration tests for the PlayClock server
//!
//! Each test runs a real server on an ephemeral port and talks to it over
//! HTTP, the same way viewers and controllers do.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use playclock_core::Snapshot;
use playclock_http::{ClockClient, Error, Subscription};
use playclock_server::config::Config;
use playclock_server::server::{ClockServer, ServerError};

/// A server running in the background
struct TestServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    async fn start(start_running: bool) -> Self {
        Self::start_with(|config| config.clock.start_running = start_running).await
    }

    async fn start_with<F: FnOnce(&mut Config)>(configure: F) -> Self {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.clock.tick_interval_ms = 20;
        config.distribution.broadcast_interval_ms = 50;
        configure(&mut config);

        let server = ClockServer::new(config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async {
            let _ = rx.await;
        }));

        Self {
            url,
            shutdown: Some(tx),
            handle,
        }
    }

    fn client(&self) -> ClockClient {
        ClockClient::new(&self.url).unwrap()
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let result = timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}

/// Read snapshots until one satisfies `pred`
async fn next_matching<F>(subscription: &mut Subscription, pred: F) -> Snapshot
where
    F: Fn(&Snapshot) -> bool,
{
    timeout(Duration::from_secs(3), async {
        loop {
            let snapshot = subscription.next().await.unwrap();
            if pred(&snapshot) {
                return snapshot;
            }
        }
    })
    .await
    .expect("no matching snapshot")
}

#[tokio::test]
async fn test_first_snapshot_on_subscribe() {
    let server = TestServer::start(false).await;

    let mut subscription = server.client().subscribe().await.unwrap();
    let first = timeout(Duration::from_secs(1), subscription.next())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.position, 0.0);
    assert!(!first.running);

    server.stop().await;
}

#[tokio::test]
async fn test_correction_reaches_every_subscriber() {
    let server = TestServer::start(true).await;
    let client = server.client();

    let mut a = client.subscribe().await.unwrap();
    let mut b = client.subscribe().await.unwrap();
    a.next().await.unwrap();
    b.next().await.unwrap();

    let response = client.seek(10.0).await.unwrap();
    assert!(response.success);
    assert_eq!(response.position, 10.0);
    assert!(response.running);

    for subscription in [&mut a, &mut b] {
        let snapshot = next_matching(subscription, |s| s.position >= 10.0).await;
        assert!(snapshot.position < 11.0);
        assert!(snapshot.running);
    }

    server.stop().await;
}

#[tokio::test]
async fn test_pause_freezes_position() {
    let server = TestServer::start(true).await;
    let client = server.client();

    let paused = client.pause().await.unwrap();
    assert!(!paused.running);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let state = client.state().await.unwrap();
    assert_eq!(state.position, paused.position);
    assert!(!state.running);

    let resumed = client.play().await.unwrap();
    assert!(resumed.running);
    assert_eq!(resumed.position, paused.position);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let state = client.state().await.unwrap();
    assert!(state.position > paused.position);

    server.stop().await;
}

#[tokio::test]
async fn test_invalid_command_leaves_state_unchanged() {
    let server = TestServer::start(false).await;
    let client = server.client();
    client.seek(5.0).await.unwrap();

    let err = client.seek(-1.0).await.unwrap_err();
    match err {
        Error::Rejected { kind, .. } => assert_eq!(kind, "invalid_command"),
        other => panic!("unexpected error: {other:?}"),
    }

    let http = reqwest::Client::new();
    for body in [r#"{"position": "abc"}"#, r#"{"running": 1}"#, "not json"] {
        let response = http
            .post(format!("{}/api/sync", server.url))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "invalid_command");
    }

    let state = client.state().await.unwrap();
    assert_eq!(state.position, 5.0);
    assert!(!state.running);

    server.stop().await;
}

#[tokio::test]
async fn test_legacy_field_names_accepted() {
    let server = TestServer::start(true).await;

    let response: serde_json::Value = reqwest::Client::new()
        .post(format!("{}/api/sync", server.url))
        .json(&serde_json::json!({ "currentTime": 7.0, "isPlaying": false }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response["success"], true);
    assert_eq!(response["position"], 7.0);
    assert_eq!(response["running"], false);

    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_does_not_affect_other_viewers() {
    let server = TestServer::start(true).await;
    let client = server.client();

    let mut a = client.subscribe().await.unwrap();
    let b = client.subscribe().await.unwrap();
    let mut c = client.subscribe().await.unwrap();
    a.next().await.unwrap();
    c.next().await.unwrap();

    drop(b);

    // Both remaining viewers keep receiving fresh snapshots
    for subscription in [&mut a, &mut c] {
        for _ in 0..3 {
            timeout(Duration::from_secs(1), subscription.next())
                .await
                .unwrap()
                .unwrap();
        }
    }

    let http = reqwest::Client::new();
    let active = timeout(Duration::from_secs(3), async {
        loop {
            let metrics: serde_json::Value = http
                .get(format!("{}/metrics", server.url))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if metrics["active_viewers"] == 2 {
                return metrics;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("dropped viewer was never deregistered");
    assert_eq!(active["viewers_connected"], 3);

    server.stop().await;
}

#[tokio::test]
async fn test_snapshot_positions_are_fresh() {
    let server = TestServer::start(true).await;
    let mut subscription = server.client().subscribe().await.unwrap();

    let first = subscription.next().await.unwrap();
    let later = next_matching(&mut subscription, |s| s.position > first.position).await;
    assert!(later.emitted_at >= first.emitted_at);

    server.stop().await;
}

#[tokio::test]
async fn test_looping_clock_never_reports_past_duration() {
    let server = TestServer::start_with(|config| config.clock.duration_secs = Some(0.3)).await;
    let client = server.client();
    let mut subscription = client.subscribe().await.unwrap();

    // Positions at or past the loop length are rejected outright
    assert!(client.seek(0.3).await.is_err());
    client.seek(0.25).await.unwrap();

    let mut positions = Vec::new();
    timeout(Duration::from_secs(3), async {
        while positions.len() < 20 {
            positions.push(subscription.next().await.unwrap().position);
        }
    })
    .await
    .expect("too few snapshots");

    for position in &positions {
        assert!((0.0..0.3).contains(position), "position {position} outside [0, 0.3)");
    }
    assert!(
        positions.windows(2).any(|w| w[1] < w[0]),
        "clock never wrapped: {positions:?}"
    );

    server.stop().await;
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start(true).await;
    assert!(server.client().health_check().await.unwrap());
    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_ends_subscriptions() {
    let server = TestServer::start(true).await;
    let mut subscription = server.client().subscribe().await.unwrap();
    subscription.next().await.unwrap();

    server.stop().await;

    let err = timeout(Duration::from_secs(3), async {
        loop {
            if let Err(e) = subscription.next().await {
                return e;
            }
        }
    })
    .await
    .expect("subscription outlived the server");
    assert!(err.is_disconnect());
}
