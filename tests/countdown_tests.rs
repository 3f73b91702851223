//! Integration tests for countdown event counting and waiting

use countdown_event::{CountdownError, CountdownEvent};
use futures::FutureExt;
use rstest::rstest;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Give spawned tasks a chance to run and suspend
async fn settle() {
    compio::time::sleep(Duration::from_millis(20)).await;
}

#[rstest]
#[case::empty("")]
#[case::single("+-")]
#[case::nested("++--")]
#[case::interleaved("+-+-+-")]
#[case::left_open("+++-")]
#[case::zigzag("++-++--+-")]
fn test_count_tracks_operations(#[case] ops: &str) {
    let event = CountdownEvent::new();
    let mut expected = 0usize;

    for op in ops.chars() {
        let count = match op {
            '+' => {
                expected += 1;
                event.increment()
            }
            '-' => {
                expected -= 1;
                event.decrement()
            }
            other => panic!("unknown op {other}"),
        };
        assert_eq!(count, expected);
        assert_eq!(event.count(), expected);
    }

    let increments = ops.matches('+').count();
    let decrements = ops.matches('-').count();
    assert_eq!(event.count(), increments - decrements);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(5)]
fn test_decrement_past_zero_panics(#[case] increments: usize) {
    let event = CountdownEvent::new();
    for _ in 0..increments {
        event.increment();
    }
    for _ in 0..increments {
        event.decrement();
    }

    let result = catch_unwind(AssertUnwindSafe(|| event.decrement()));
    assert!(result.is_err());
    assert_eq!(event.count(), 0);
    assert_eq!(event.try_decrement(), Err(CountdownError::Underflow));
}

#[test]
fn test_fresh_event_wait_is_immediate() {
    let event = CountdownEvent::new();
    assert_eq!(event.wait().now_or_never(), Some(()));
}

#[test]
fn test_wait_immediate_after_returning_to_zero() {
    let event = CountdownEvent::new();
    event.increment();
    assert_eq!(event.wait().now_or_never(), None);
    event.decrement();
    assert_eq!(event.wait().now_or_never(), Some(()));
}

#[compio::test]
async fn test_two_step_countdown_scenario() {
    let event = CountdownEvent::new();
    assert_eq!(event.increment(), 1);
    assert_eq!(event.increment(), 2);

    let resumed = Arc::new(AtomicBool::new(false));
    let waiter = {
        let event = event.clone();
        let resumed = resumed.clone();
        compio::runtime::spawn(async move {
            event.wait().await;
            resumed.store(true, Ordering::SeqCst);
        })
    };

    settle().await;
    assert!(!resumed.load(Ordering::SeqCst));

    assert_eq!(event.decrement(), 1);
    settle().await;
    assert!(!resumed.load(Ordering::SeqCst));

    assert_eq!(event.decrement(), 0);
    waiter.await.unwrap();
    assert!(resumed.load(Ordering::SeqCst));

    let result = catch_unwind(AssertUnwindSafe(|| event.decrement()));
    assert!(result.is_err());
}

#[compio::test]
async fn test_all_spawned_waiters_released() {
    let event = CountdownEvent::new();
    event.increment();

    let resumed = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for i in 0..16 {
        let event = event.clone();
        let resumed = resumed.clone();
        handles.push(compio::runtime::spawn(async move {
            event.wait().await;
            resumed.fetch_add(1, Ordering::SeqCst);
            i
        }));
    }

    settle().await;
    assert_eq!(resumed.load(Ordering::SeqCst), 0);

    event.decrement();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert_eq!(results.len(), 16);
    assert_eq!(resumed.load(Ordering::SeqCst), 16);
}

#[compio::test]
async fn test_pending_waiters_released_together() {
    let event = CountdownEvent::new();
    event.increment();
    event.increment();

    let mut waits: Vec<_> = (0..4).map(|_| Box::pin(event.wait())).collect();
    for wait in &mut waits {
        assert!(futures::poll!(wait.as_mut()).is_pending());
    }

    event.decrement();
    for wait in &mut waits {
        assert!(futures::poll!(wait.as_mut()).is_pending());
    }

    event.decrement();
    futures::future::join_all(waits).await;
    assert_eq!(event.count(), 0);
}

#[compio::test]
async fn test_external_timeout_leaves_count_intact() {
    let event = CountdownEvent::new();
    event.increment();

    let timed_out = compio::time::timeout(Duration::from_millis(20), event.wait()).await;
    assert!(timed_out.is_err());
    assert_eq!(event.count(), 1);

    event.decrement();
    let completed = compio::time::timeout(Duration::from_millis(20), event.wait()).await;
    assert!(completed.is_ok());
}

#[compio::test]
async fn test_waiter_released_despite_immediate_reincrement() {
    let event = CountdownEvent::new();
    event.increment();

    let waiter = {
        let event = event.clone();
        compio::runtime::spawn(async move { event.wait().await })
    };
    settle().await;

    // Busy again before the waiter has a chance to run
    event.decrement();
    event.increment();

    waiter.await.unwrap();
    assert_eq!(event.count(), 1);
    event.decrement();
}

#[compio::test]
async fn test_drain_many_producers() {
    let event = CountdownEvent::new();
    let done = Arc::new(AtomicUsize::new(0));

    for i in 0..100u64 {
        let guard = event.guard();
        let done = done.clone();
        compio::runtime::spawn(async move {
            let _guard = guard;
            compio::time::sleep(Duration::from_millis(i % 7)).await;
            done.fetch_add(1, Ordering::SeqCst);
        })
        .detach();
    }

    event.wait().await;
    assert_eq!(done.load(Ordering::SeqCst), 100);
    assert_eq!(event.count(), 0);
}
