//! End-to-end tests of the session engine against scripted fake devices.

mod support;

use std::time::{Duration, Instant};

use telpool::{
    CommandOutcome, DeviceEndpoint, DeviceId, FailureKind, Session, SessionConfig, SessionPool,
    SessionState,
};

use support::{Behavior, FakeDevice, refused_addr};

fn fast_config() -> SessionConfig {
    SessionConfig::default().with_timeout(Duration::from_millis(500))
}

#[tokio::test]
async fn batch_preserves_order_and_captures_output() {
    let device = FakeDevice::spawn(Behavior::Normal).await;
    let endpoints = vec![device.endpoint("pyclass", "88newclass")];

    let mut pool = SessionPool::open_all(endpoints, fast_config()).await;
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.ready_count(), 1);

    let report = pool.run_batch(&["term len 0", "show ip inter bri"]).await;
    assert_eq!(report.len(), 1);

    let (_, device_report) = report.iter().next().unwrap();
    assert!(device_report.is_success());
    assert_eq!(device_report.records.len(), 2);

    // Enqueue order is preserved and every record captured real output.
    assert_eq!(device_report.records[0].command, "term len 0");
    assert_eq!(device_report.records[1].command, "show ip inter bri");
    for record in &device_report.records {
        assert!(record.is_success());
        assert!(!record.output.is_empty(), "empty output for {}", record.command);
        assert!(record.prompt.ends_with('>'));
    }
    assert!(device_report.records[1].output.contains("Vlan1"));

    pool.close_all().await.unwrap();
}

#[tokio::test]
async fn chunked_prompts_still_match() {
    // Prompt text split across many small writes must match exactly like
    // a single write would.
    let device = FakeDevice::spawn(Behavior::ChunkedPrompts).await;
    let endpoints = vec![device.endpoint("admin", "secret")];

    let mut pool = SessionPool::open_all(endpoints, fast_config()).await;
    assert_eq!(pool.ready_count(), 1);

    let report = pool.run_batch(&["show ip inter bri"]).await;
    let (_, device_report) = report.iter().next().unwrap();
    assert!(device_report.is_success());
    assert!(device_report.records[0].output.contains("Vlan1"));

    pool.close_all().await.unwrap();
}

#[tokio::test]
async fn missing_password_prompt_is_auth_failure() {
    let device = FakeDevice::spawn(Behavior::NoPasswordPrompt).await;
    let endpoints = vec![device.endpoint("admin", "secret")];

    let mut pool = SessionPool::open_all(endpoints, fast_config()).await;
    assert_eq!(pool.ready_count(), 0);

    let id = pool.ids().next().unwrap().clone();
    let failure = pool.failure(&id).expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::Auth);

    // No command is attempted for a device that never authenticated.
    let report = pool.run_batch(&["show run"]).await;
    let device_report = report.get(&id).unwrap();
    assert_eq!(
        device_report.records[0].outcome,
        CommandOutcome::NotAttempted
    );

    pool.close_all().await.unwrap();
    device
        .assert_no_open_connections(Duration::from_secs(2))
        .await;
}

#[tokio::test]
async fn credential_rejection_is_detected() {
    let device = FakeDevice::spawn(Behavior::RejectPassword).await;
    let endpoints = vec![device.endpoint("admin", "wrong")];

    let pool = SessionPool::open_all(endpoints, fast_config()).await;
    let id = pool.ids().next().unwrap().clone();
    let failure = pool.failure(&id).expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::Auth);
    assert!(failure.message.contains("re-requested"));

    pool.close_all().await.unwrap();
}

#[tokio::test]
async fn one_refused_device_does_not_block_the_rest() {
    let good_a = FakeDevice::spawn(Behavior::Normal).await;
    let good_b = FakeDevice::spawn(Behavior::Normal).await;
    let dead = refused_addr().await;

    let dead_endpoint = DeviceEndpoint::new(dead.ip().to_string(), "admin", "secret")
        .with_port(dead.port());
    let dead_id = DeviceId::from(&dead_endpoint);
    let endpoints = vec![
        good_a.endpoint("admin", "secret"),
        dead_endpoint,
        good_b.endpoint("admin", "secret"),
    ];

    let mut pool = SessionPool::open_all(endpoints, fast_config()).await;
    assert_eq!(pool.len(), 3);
    assert_eq!(pool.ready_count(), 2);
    assert_eq!(pool.failure(&dead_id).unwrap().kind, FailureKind::Connect);

    let report = pool.run_batch(&["term len 0"]).await;
    let mut successes = 0;
    for (id, device_report) in report.iter() {
        if *id == dead_id {
            assert_eq!(
                device_report.records[0].outcome,
                CommandOutcome::NotAttempted
            );
        } else {
            assert!(device_report.is_success());
            successes += 1;
        }
    }
    assert_eq!(successes, 2);

    pool.close_all().await.unwrap();
}

#[tokio::test]
async fn silent_device_fails_within_the_timeout_bound() {
    let device = FakeDevice::spawn(Behavior::Mute).await;
    let endpoints = vec![device.endpoint("admin", "secret")];

    let config = SessionConfig::default().with_timeout(Duration::from_millis(300));
    let start = Instant::now();
    let pool = SessionPool::open_all(endpoints, config).await;
    let elapsed = start.elapsed();

    // Never hangs: the login wait is bounded by the read timeout plus
    // scheduling slack, and the failure is reported, not dropped.
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(1500), "took {:?}", elapsed);

    let id = pool.ids().next().unwrap().clone();
    assert_eq!(pool.failure(&id).unwrap().kind, FailureKind::Auth);

    pool.close_all().await.unwrap();
}

#[tokio::test]
async fn close_all_releases_every_connection() {
    let device = FakeDevice::spawn(Behavior::Normal).await;
    let endpoints = vec![device.endpoint("a", "a"), {
        // Second session to the same device under a distinct identity is
        // not possible (keys are unique), so use a second fake device.
        FakeDevice::spawn(Behavior::Normal).await.endpoint("b", "b")
    }];

    let mut pool = SessionPool::open_all(endpoints, fast_config()).await;
    assert_eq!(pool.ready_count(), 2);

    let _ = pool.run_batch(&["term len 0"]).await;
    pool.close_all().await.unwrap();

    device
        .assert_no_open_connections(Duration::from_secs(2))
        .await;
}

#[tokio::test]
async fn duplicate_endpoints_are_skipped() {
    let device = FakeDevice::spawn(Behavior::Normal).await;
    let endpoints = vec![
        device.endpoint("admin", "secret"),
        device.endpoint("admin", "secret"),
    ];

    let pool = SessionPool::open_all(endpoints, fast_config()).await;
    assert_eq!(pool.len(), 1);
    pool.close_all().await.unwrap();
}

#[tokio::test]
async fn cancel_interrupts_an_in_flight_read() {
    let device = FakeDevice::spawn(Behavior::Normal).await;
    let endpoints = vec![device.endpoint("admin", "secret")];

    // Long read timeout: only cancellation can end the "hang" command early.
    let config = SessionConfig::default().with_timeout(Duration::from_secs(10));
    let mut pool = SessionPool::open_all(endpoints, config).await;
    assert_eq!(pool.ready_count(), 1);

    let id = pool.ids().next().unwrap().clone();
    let canceller = pool.canceller(&id).unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let report = pool.run_batch(&["hang", "show ip inter bri"]).await;
    assert!(start.elapsed() < Duration::from_secs(5), "cancel was not prompt");

    let device_report = report.get(&id).unwrap();
    assert_eq!(device_report.failure.as_ref().unwrap().kind, FailureKind::Cancelled);
    assert!(matches!(
        device_report.records[0].outcome,
        CommandOutcome::Failed { .. }
    ));
    assert_eq!(
        device_report.records[1].outcome,
        CommandOutcome::NotAttempted
    );
    assert_eq!(pool.state(&id), Some(SessionState::Closed));

    pool.close_all().await.unwrap();
}

#[tokio::test]
async fn reconnect_returns_through_connecting() {
    let device = FakeDevice::spawn(Behavior::Normal).await;
    let mut session =
        Session::new(device.endpoint("admin", "secret"), fast_config()).unwrap();

    session.open().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    let first = session.run("term len 0").await.unwrap();
    assert!(first.is_success());

    session.reconnect().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    // Log survives the reconnect; the session works again.
    assert_eq!(session.log().len(), 1);
    let second = session.run("show ip inter bri").await.unwrap();
    assert!(second.output.contains("Vlan1"));

    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn report_serializes_to_json() {
    let device = FakeDevice::spawn(Behavior::Normal).await;
    let endpoints = vec![device.endpoint("admin", "secret")];

    let mut pool = SessionPool::open_all(endpoints, fast_config()).await;
    let report = pool.run_batch(&["term len 0"]).await;

    let json = serde_json::to_value(&report).unwrap();
    let (id, _) = report.iter().next().unwrap();
    assert_eq!(json[id.as_str()]["records"][0]["command"], "term len 0");

    pool.close_all().await.unwrap();
}
