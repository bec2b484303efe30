// tests/orchestrator_tests.rs
mod common;

use common::{Canned, MockTransport};
use std::time::{Duration, Instant};
use ustextract::{FetchError, FetchOrchestrator, FetchRequest, FetchTask, TaskOutcome};

fn parse_number(_: &String, body: Vec<u8>) -> Result<u32, FetchError> {
    String::from_utf8_lossy(&body)
        .trim()
        .parse::<u32>()
        .map_err(|err| FetchError::malformed(err.to_string()))
}

fn task(key: &str) -> FetchTask<String> {
    FetchTask::new(key.to_string(), FetchRequest::get(format!("https://mock/{}", key)))
}

#[tokio::test]
async fn failures_stay_with_their_own_key() {
    let transport = MockTransport::new()
        .with_timeout(Duration::from_millis(100))
        .on_get("https://mock/ok", Canned::Body(b"7".to_vec()))
        .on_get("https://mock/server-error", Canned::Status(500))
        .on_get("https://mock/slow", Canned::Delayed(Duration::from_secs(5), b"1".to_vec()))
        .on_get("https://mock/garbled", Canned::Body(b"<html>".to_vec()));

    let tasks = ["ok", "server-error", "slow", "garbled", "unrouted"].map(task).to_vec();
    let wave = FetchOrchestrator::new(&transport, "test").run(tasks, parse_number).await;

    assert_eq!(wave.len(), 5);
    assert!(matches!(wave.get(&"ok".to_string()), Some(TaskOutcome::Done(7))));
    assert!(matches!(
        wave.get(&"server-error".to_string()).and_then(|o| o.error()),
        Some(FetchError::Status { status: 500, .. })
    ));
    assert!(matches!(
        wave.get(&"slow".to_string()).and_then(|o| o.error()),
        Some(FetchError::Timeout(_))
    ));
    assert!(matches!(
        wave.get(&"garbled".to_string()).and_then(|o| o.error()),
        Some(FetchError::Malformed(_))
    ));

    let mut failed: Vec<_> = wave.failed_keys().into_iter().cloned().collect();
    failed.sort();
    assert_eq!(failed, vec!["garbled", "server-error", "slow", "unrouted"]);
}

#[tokio::test]
async fn every_key_is_returned_whatever_fails() {
    for k in 0..12usize {
        let mut transport = MockTransport::new();
        for i in 0..k {
            let url = format!("https://mock/{}", i);
            transport = if i % 3 == 0 {
                transport.on_get(&url, Canned::Status(503))
            } else {
                transport.on_get(&url, Canned::Body(i.to_string().into_bytes()))
            };
        }
        let tasks = (0..k).map(|i| task(&i.to_string())).collect();
        let wave = FetchOrchestrator::new(&transport, "test").run(tasks, parse_number).await;
        assert_eq!(wave.len(), k);
        assert_eq!(wave.failed_keys().len(), (0..k).filter(|i| i % 3 == 0).count());
    }
}

#[tokio::test]
async fn tasks_wait_on_io_together() {
    let mut transport = MockTransport::new();
    for i in 0..10 {
        transport = transport.on_get(
            &format!("https://mock/{}", i),
            Canned::Delayed(Duration::from_millis(200), b"1".to_vec()),
        );
    }
    let tasks = (0..10).map(|i| task(&i.to_string())).collect();

    let started = Instant::now();
    let wave = FetchOrchestrator::new(&transport, "test").run(tasks, parse_number).await;

    assert_eq!(wave.done_count(), 10);
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[tokio::test]
async fn timeout_override_applies_to_the_whole_wave() {
    let transport = MockTransport::new()
        .on_get("https://mock/a", Canned::Delayed(Duration::from_millis(300), b"1".to_vec()))
        .on_get("https://mock/b", Canned::Delayed(Duration::from_millis(300), b"2".to_vec()));
    let orchestrator = FetchOrchestrator::new(&transport, "test").with_timeout(Duration::from_millis(20));
    assert_eq!(orchestrator.timeout(), Duration::from_millis(20));

    let wave = orchestrator.run(vec![task("a"), task("b")], parse_number).await;
    let values = wave.into_values_or_default();

    assert_eq!(values.len(), 2);
    assert!(values.values().all(|value| *value == 0));
}

#[tokio::test]
async fn empty_wave_returns_immediately() {
    let transport = MockTransport::new();
    let wave = FetchOrchestrator::new(&transport, "test")
        .run(Vec::<FetchTask<String>>::new(), parse_number)
        .await;
    assert!(wave.is_empty());
    assert!(transport.calls().is_empty());
}
