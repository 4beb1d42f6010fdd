//! Integration tests for the round timer.
//!
//! Uses paused tokio time so sleeps resolve as soon as the runtime is
//! otherwise idle.

use std::time::Duration;

use battlequiz_timer::{RoundTimer, TimerFired, TimerKind, TimerRequest};
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

fn countdown(generation: u64) -> TimerRequest {
    TimerRequest {
        kind: TimerKind::Countdown,
        generation,
        after: Duration::from_secs(3),
    }
}

fn deadline(generation: u64) -> TimerRequest {
    TimerRequest {
        kind: TimerKind::AnswerDeadline,
        generation,
        after: Duration::from_secs(32),
    }
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_armed_timer_fires_after_delay() {
    let mut t = RoundTimer::new();
    let start = Instant::now();
    t.arm(countdown(7));

    let fired = t.wait_for_fire().await;
    assert_eq!(
        fired,
        TimerFired {
            kind: TimerKind::Countdown,
            generation: 7
        }
    );
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert!(!t.is_armed(), "slot is cleared after firing");
    assert_eq!(t.fired_total(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timer_fires_once() {
    let mut t = RoundTimer::new();
    t.arm(countdown(1));
    t.wait_for_fire().await;

    let again = tokio::time::timeout(Duration::from_secs(60), t.wait_for_fire()).await;
    assert!(again.is_err(), "a one-shot timer must not fire twice");
}

// =========================================================================
// Idle mode pends forever
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_timer_never_fires() {
    let mut t = RoundTimer::new();
    let result = tokio::time::timeout(Duration::from_secs(3600), t.wait_for_fire()).await;
    assert!(result.is_err(), "idle timer should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_timer_never_fires() {
    let mut t = RoundTimer::new();
    t.arm(deadline(4));
    t.cancel();
    let result = tokio::time::timeout(Duration::from_secs(3600), t.wait_for_fire()).await;
    assert!(result.is_err());
}

// =========================================================================
// Replacement and sync
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_arm_replaces_pending_timer() {
    let mut t = RoundTimer::new();
    t.arm(countdown(1));
    t.arm(deadline(2));

    let start = Instant::now();
    let fired = t.wait_for_fire().await;
    assert_eq!(fired.kind, TimerKind::AnswerDeadline);
    assert_eq!(fired.generation, 2);
    assert_eq!(start.elapsed(), Duration::from_secs(32));
}

#[tokio::test(start_paused = true)]
async fn test_sync_same_request_keeps_deadline() {
    let mut t = RoundTimer::new();
    let start = Instant::now();
    t.sync(Some(countdown(5)));

    tokio::time::advance(Duration::from_secs(2)).await;
    t.sync(Some(countdown(5)));
    assert_eq!(t.remaining(), Some(Duration::from_secs(1)));

    t.wait_for_fire().await;
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

// =========================================================================
// select! integration
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_keeps_slot() {
    let mut t = RoundTimer::new();
    t.arm(countdown(9));

    let (tx, mut rx) = tokio::sync::mpsc::channel::<u32>(1);
    tx.send(1).await.unwrap();

    tokio::select! {
        biased;
        Some(_) = rx.recv() => {}
        _ = t.wait_for_fire() => panic!("timer must not win against a ready message"),
    }

    assert_eq!(t.pending(), Some((TimerKind::Countdown, 9)));
    let fired = t.wait_for_fire().await;
    assert_eq!(fired.generation, 9);
}
