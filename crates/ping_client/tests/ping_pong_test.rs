use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ping_client::client::{PingRequest, PongClient, PongReply};
use ping_client::reqwest_integration::ReqwestGet;
use ping_client::scheduler::{AdmissionScheduler, SchedulerSettings, TickOutcome};
use pong_server::app::{PongState, router};
use rate_limiter_shared::clock::ManualClock;
use rate_limiter_shared::cross_process::CrossProcessLimiter;
use rate_limiter_shared::settings::{TokenBucketSettings, WindowSettings};
use rate_limiter_shared::shared_counter::SharedCounterStore;
use tempfile::TempDir;
use tower::ServiceExt;

/// Serves a pong router whose buckets never refill, so outcomes depend only on call order.
async fn spawn_pong() -> SocketAddr {
    let state =
        PongState::with_clock(TokenBucketSettings::default(), Arc::new(ManualClock::new(0)))
            .unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

fn pong_client(addr: SocketAddr) -> PongClient {
    let inner = ReqwestGet::new(Duration::from_secs(5)).unwrap();
    PongClient::new(inner, &format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn second_call_is_throttled_not_failed() {
    let addr = spawn_pong().await;
    let client = pong_client(addr);

    let first = client
        .clone()
        .oneshot(PingRequest::new("ping-01"))
        .await
        .unwrap();
    let second = client.oneshot(PingRequest::new("ping-02")).await.unwrap();

    assert_eq!(first, PongReply::Pong("world".into()));
    assert_eq!(second, PongReply::Throttled("Too many requests.".into()));
}

#[tokio::test]
async fn unreachable_responder_is_a_failure() {
    // Grab a free port and close it again.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = pong_client(addr);

    assert!(client.oneshot(PingRequest::new("ping-01")).await.is_err());
}

#[tokio::test]
async fn two_pingers_share_one_window_budget() {
    let addr = spawn_pong().await;
    let dir = TempDir::new().unwrap();
    let lock_file = dir.path().join("ping-lock.bin");
    let clock = Arc::new(ManualClock::new(10_000));

    let pinger = |name: &str| {
        let limiter = CrossProcessLimiter::with_clock(
            SharedCounterStore::new(&lock_file),
            WindowSettings::default(),
            Arc::clone(&clock),
        )
        .unwrap();
        let settings = SchedulerSettings::builder().app_name(name).build();
        AdmissionScheduler::new(limiter, pong_client(addr), settings).unwrap()
    };
    let first = pinger("ping-01");
    let second = pinger("ping-02");

    let mut calls = Vec::new();
    for _ in 0..3 {
        for scheduler in [&first, &second] {
            if let TickOutcome::Dispatched(call) = scheduler.tick() {
                calls.push(call);
            }
        }
    }
    assert_eq!(calls.len(), 2);

    let mut pongs = 0;
    let mut throttled = 0;
    for call in calls {
        match call.await.unwrap().unwrap() {
            PongReply::Pong(_) => pongs += 1,
            PongReply::Throttled(_) => throttled += 1,
        }
    }
    assert_eq!((pongs, throttled), (1, 1));

    let total_skipped = first.stats().snapshot().skipped + second.stats().snapshot().skipped;
    assert_eq!(total_skipped, 4);
    assert_eq!(
        SharedCounterStore::new(&lock_file)
            .snapshot()
            .unwrap()
            .request_count,
        2
    );
}
