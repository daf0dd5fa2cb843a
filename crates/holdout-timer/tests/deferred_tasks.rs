//! Integration tests for per-key deferred tasks.
//!
//! Time is paused; `sleep` in the test body auto-advances the clock so the
//! spawned timers fire deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use holdout_timer::DeferredTasks;

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn bump(c: &Arc<AtomicUsize>, by: usize) -> impl Future<Output = ()> + use<> {
    let c = Arc::clone(c);
    async move {
        c.fetch_add(by, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn test_task_fires_after_delay() {
    let tasks = DeferredTasks::<u64>::new();
    let fired = counter();

    tasks.schedule(1, Duration::from_secs(5), bump(&fired, 1));
    assert!(tasks.is_scheduled(&1));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!tasks.is_scheduled(&1));
    assert!(tasks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_prevents_firing() {
    let tasks = DeferredTasks::<u64>::new();
    let fired = counter();

    tasks.schedule(7, Duration::from_secs(5), bump(&fired, 1));
    assert!(tasks.cancel(&7));
    assert!(!tasks.cancel(&7), "second cancel finds nothing");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reschedule_replaces_pending_task() {
    let tasks = DeferredTasks::<u64>::new();
    let fired = counter();

    tasks.schedule(1, Duration::from_secs(5), bump(&fired, 1));
    tasks.schedule(1, Duration::from_secs(5), bump(&fired, 10));
    assert_eq!(tasks.len(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 10);
}

#[tokio::test(start_paused = true)]
async fn test_keys_are_independent() {
    let tasks = DeferredTasks::<u64>::new();
    let fired = counter();

    tasks.schedule(1, Duration::from_secs(5), bump(&fired, 1));
    tasks.schedule(2, Duration::from_secs(5), bump(&fired, 100));
    tasks.cancel(&1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 100);
}

#[tokio::test(start_paused = true)]
async fn test_drop_aborts_everything() {
    let fired = counter();
    {
        let tasks = DeferredTasks::<u64>::new();
        tasks.schedule(1, Duration::from_secs(1), bump(&fired, 1));
        tasks.schedule(2, Duration::from_secs(2), bump(&fired, 1));
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_fire_is_noop() {
    let tasks = DeferredTasks::<u64>::new();
    let fired = counter();

    tasks.schedule(3, Duration::from_millis(10), bump(&fired, 1));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!tasks.cancel(&3));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}
