//! End-to-end engine tests: a scheduler over a real database probing a
//! local HTTP responder.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use upwatch_service::database::{self, DatabaseImpl};
use upwatch_service::monitoring::checker::CheckType;
use upwatch_service::monitoring::types::CheckStatus;
use upwatch_service::monitoring::{CheckScheduler, ProbeExecutor};

/// Minimal HTTP responder that answers 200 after an optional delay
async fn spawn_http_server(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let _ = stream
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                    )
                    .await;
                let _ = stream.shutdown().await;
            });
        }
    });

    addr
}

async fn engine() -> (Arc<DatabaseImpl>, CheckScheduler, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engine.db");
    let pool = database::connect(&db_path.to_string_lossy()).await.unwrap();
    let db = Arc::new(DatabaseImpl::new_from_pool(pool));

    let executor = Arc::new(ProbeExecutor::new().unwrap());
    let scheduler = CheckScheduler::new(db.clone(), db.clone(), executor);
    (db, scheduler, dir)
}

#[tokio::test]
async fn engine_records_periodic_results() {
    let addr = spawn_http_server(Duration::ZERO).await;
    let (db, scheduler, _dir) = engine().await;

    let mut monitor = upwatch_service::database::models::Monitor::new(
        "local".to_string(),
        format!("http://{addr}/"),
        CheckType::Http,
    );
    monitor.interval_seconds = 1;
    monitor.timeout_seconds = 2;
    db.create_monitor(&monitor).await.unwrap();

    assert_eq!(scheduler.start().await.unwrap(), 1);
    tokio::time::sleep(Duration::from_millis(3200)).await;
    scheduler.stop().await.unwrap();

    let checks = db.recent_checks(monitor.uuid, 20).await.unwrap();
    // Immediate first check plus roughly one per second
    assert!(
        (2..=5).contains(&checks.len()),
        "expected 2..=5 recorded checks, got {}",
        checks.len()
    );
    for check in &checks {
        assert_eq!(check.status, CheckStatus::Up);
        assert_eq!(check.status_code, Some(200));
        assert!(check.response_time_ms.is_some());
    }
}

#[tokio::test]
async fn slow_probe_never_overlaps_and_keeps_interval_spacing() {
    // Responder holds every request longer than the monitor's interval and
    // tracks how many connections it is serving at once
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let accepts = Arc::new(std::sync::Mutex::new(Vec::<Instant>::new()));

    {
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        let accepts = Arc::clone(&accepts);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                accepts.lock().unwrap().push(Instant::now());
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);

                let active = Arc::clone(&active);
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    tokio::time::sleep(Duration::from_millis(1500)).await;
                    let _ = stream
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                        )
                        .await;
                    let _ = stream.shutdown().await;
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });
    }

    let (db, scheduler, _dir) = engine().await;
    let mut monitor = upwatch_service::database::models::Monitor::new(
        "slow".to_string(),
        format!("http://{addr}/"),
        CheckType::Http,
    );
    monitor.interval_seconds = 1;
    monitor.timeout_seconds = 5;
    db.create_monitor(&monitor).await.unwrap();

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(4000)).await;
    scheduler.stop().await.unwrap();
    // The last dispatched check may still be talking to the responder
    tokio::time::sleep(Duration::from_millis(1700)).await;

    assert_eq!(
        max_active.load(Ordering::SeqCst),
        1,
        "two checks for one monitor were in flight at the same time"
    );

    let accepts = accepts.lock().unwrap();
    assert!(accepts.len() >= 2, "expected at least two dispatches, got {}", accepts.len());
    for pair in accepts.windows(2) {
        let spacing = pair[1] - pair[0];
        assert!(
            spacing >= Duration::from_millis(950),
            "dispatches {:?} apart, tighter than the 1s interval",
            spacing
        );
    }
    drop(accepts);

    let checks = db.recent_checks(monitor.uuid, 20).await.unwrap();
    assert!(!checks.is_empty());
    for check in &checks {
        assert_eq!(check.status, CheckStatus::Up);
    }
}

#[tokio::test]
async fn stop_lets_inflight_check_finish() {
    let addr = spawn_http_server(Duration::from_millis(800)).await;
    let (db, scheduler, _dir) = engine().await;

    let mut monitor = upwatch_service::database::models::Monitor::new(
        "slow".to_string(),
        format!("http://{addr}/"),
        CheckType::Http,
    );
    monitor.interval_seconds = 30;
    monitor.timeout_seconds = 5;
    db.create_monitor(&monitor).await.unwrap();

    scheduler.start().await.unwrap();
    // The immediate first check is still talking to the slow responder
    tokio::time::sleep(Duration::from_millis(150)).await;
    scheduler.stop().await.unwrap();

    let before = db.recent_checks(monitor.uuid, 10).await.unwrap();
    assert!(before.is_empty(), "check should still be in flight at stop");

    tokio::time::sleep(Duration::from_millis(1200)).await;
    let after = db.recent_checks(monitor.uuid, 10).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].status, CheckStatus::Up);
}
