//! Manager-level and per-call deadlines. Paused-clock tests: expiry
//! happens at the configured instant, and the wrapped action is
//! detached rather than cancelled.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use rundown::{BoxError, Manager, ManagerConfig, deadline};

#[tokio::test(start_paused = true)]
async fn slow_acquire_times_out_at_the_configured_deadline() {
    let manager = Manager::with_config(ManagerConfig {
        acquire_timeout: Some(Duration::from_millis(100)),
        ..Default::default()
    })
    .expect("config is valid");

    let start = Instant::now();
    let err = manager
        .add(
            || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, io::Error>(1u32)
            },
            |_resource: Arc<u32>| Ok::<_, io::Error>(()),
        )
        .await
        .expect_err("deadline expired");

    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "timeout of 100ms expired");
    assert_eq!(start.elapsed(), Duration::from_millis(100));

    // A timed-out acquisition is a failed acquisition: full teardown.
    assert!(manager.is_closed());
}

#[tokio::test(start_paused = true)]
async fn fast_acquire_is_untouched_by_the_deadline() {
    let manager = Manager::with_config(ManagerConfig {
        acquire_timeout: Some(Duration::from_millis(100)),
        ..Default::default()
    })
    .expect("config is valid");

    let resource = manager
        .add(
            || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, io::Error>(5u32)
            },
            |_resource: Arc<u32>| Ok::<_, io::Error>(()),
        )
        .await
        .expect("well within the deadline");
    assert_eq!(*resource, 5);

    manager.close().await.expect("clean close");
}

#[tokio::test(start_paused = true)]
async fn slow_release_times_out_but_the_drain_continues() {
    let manager = Manager::with_config(ManagerConfig {
        release_timeout: Some(Duration::from_millis(100)),
        ..Default::default()
    })
    .expect("config is valid");
    let log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    let recording = |log: &Arc<Mutex<Vec<u32>>>| {
        let log = Arc::clone(log);
        move |resource: Arc<u32>| {
            log.lock().push(*resource);
            Ok::<_, io::Error>(())
        }
    };

    manager
        .add(|| async { Ok::<_, io::Error>(1u32) }, recording(&log))
        .await
        .expect("add succeeds");
    manager
        .add(
            || async { Ok::<_, io::Error>(2u32) },
            |_resource: Arc<u32>| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, io::Error>(())
            },
        )
        .await
        .expect("add succeeds");

    let err = manager.close().await.expect_err("one release timed out");
    assert!(err.is_timeout());
    assert!(err.secondary().is_empty());
    assert_eq!(*log.lock(), vec![1], "the drain moved on past the timeout");
}

/// The wrapper is freestanding: callers can bound their own action and
/// pass the flattened result through `add` untouched.
#[tokio::test(start_paused = true)]
async fn callers_can_wrap_their_own_acquire() {
    let manager = Manager::new();

    let err = manager
        .add(
            || async {
                let slow = async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, BoxError>(1u32)
                };
                match deadline::within(Duration::from_millis(50), slow).await {
                    Ok(settled) => settled,
                    Err(expired) => Err(expired.into()),
                }
            },
            |_resource: Arc<u32>| Ok::<_, io::Error>(()),
        )
        .await
        .expect_err("inner deadline expired");

    // Surfaced as the acquire's own failure, caused by the timeout.
    assert_eq!(err.to_string(), "acquire failed: timeout of 50ms expired");
}

#[tokio::test(start_paused = true)]
async fn expired_release_keeps_running_detached() {
    let manager = Manager::with_config(ManagerConfig {
        release_timeout: Some(Duration::from_millis(100)),
        ..Default::default()
    })
    .expect("config is valid");

    let finished = Arc::new(AtomicBool::new(false));
    let finished_c = Arc::clone(&finished);
    manager
        .add(
            || async { Ok::<_, io::Error>(1u32) },
            move |_resource: Arc<u32>| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                finished_c.store(true, Ordering::SeqCst);
                Ok::<_, io::Error>(())
            },
        )
        .await
        .expect("add succeeds");

    let err = manager.close().await.expect_err("release timed out");
    assert!(err.is_timeout());
    assert!(!finished.load(Ordering::SeqCst));

    // Not cancelled: once its sleep elapses, the detached release runs
    // to completion.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(finished.load(Ordering::SeqCst));
}
