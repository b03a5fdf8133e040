//! CPR timer scenarios on a simulated clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use peds_resus_core::config::CprConfig;
use peds_resus_core::cpr::{CprEventKind, CprSession, CprSnapshot, CprState, CprTimer, ManualClock};

fn timer() -> (Arc<ManualClock>, CprTimer<Arc<ManualClock>>) {
    let clock = Arc::new(ManualClock::new());
    let timer = CprTimer::new(Arc::clone(&clock), 10);
    (clock, timer)
}

#[test]
fn test_elapsed_accumulates_across_pauses() {
    for pause in [0, 1, 45_000, 3_600_000] {
        let (clock, mut timer) = timer();
        timer.start();
        clock.advance(5000);
        timer.pause();
        clock.advance(pause);
        timer.start();
        clock.advance(3000);
        assert_eq!(timer.elapsed_ms(), 8000, "pause of {} ms", pause);
    }
}

#[test]
fn test_event_times_use_session_time() {
    let (clock, mut timer) = timer();
    clock.set(1_000_000);
    timer.start();
    clock.advance(30_000);
    timer.record(CprEventKind::Epinephrine);
    timer.pause();
    clock.advance(10_000);
    timer.start();
    clock.advance(120_000);
    timer.record(CprEventKind::Epinephrine);

    let times: Vec<u64> = timer.events().iter().map(|e| e.time_ms).collect();
    assert_eq!(times, vec![30_000, 150_000]);
    assert_eq!(timer.time_since_last(CprEventKind::Epinephrine), Some(0));
    clock.advance(60_000);
    assert_eq!(timer.snapshot().since_last_epinephrine_ms, Some(60_000));
}

#[test]
fn test_resuscitation_cycle() {
    let (clock, mut timer) = timer();
    timer.start();

    // Two minutes of compressions at 110/min, with a shock and a dose
    let interval = 60_000 / 110;
    for i in 0..220 {
        timer.record(CprEventKind::Compression);
        if i == 100 {
            timer.record(CprEventKind::Shock);
        }
        if i == 150 {
            timer.record(CprEventKind::Epinephrine);
        }
        clock.advance(interval);
    }

    let snap = timer.snapshot();
    assert_eq!(snap.state, CprState::Running);
    assert_eq!(snap.compressions, 220);
    assert_eq!(snap.shocks, 1);
    assert_eq!(snap.epinephrine_doses, 1);
    let rate = snap.compression_rate.unwrap();
    assert!((rate - 110.0).abs() < 1.0, "rate was {}", rate);
}

#[test]
fn test_reset_returns_to_idle() {
    let (clock, mut timer) = timer();
    timer.start();
    clock.advance(10_000);
    timer.record(CprEventKind::Shock);
    timer.reset();

    let snap = timer.snapshot();
    assert_eq!(snap.state, CprState::Idle);
    assert_eq!(snap.elapsed_ms, 0);
    assert_eq!(snap.shocks, 0);
    assert_eq!(snap.since_last_shock_ms, None);
}

#[test]
fn test_ticker_snapshots_follow_timer() {
    let seen: Arc<Mutex<Vec<CprSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let config = CprConfig {
        rate_window: 10,
        tick_interval_ms: 5,
    };
    let session = CprSession::system(&config).with_ticker(Arc::new(move |snap: CprSnapshot| {
        sink.lock().unwrap().push(snap);
    }));

    session.start();
    session.record(CprEventKind::Shock);
    thread::sleep(Duration::from_millis(50));
    session.pause();

    let snaps = seen.lock().unwrap().clone();
    assert!(!snaps.is_empty());
    assert!(snaps.iter().all(|s| s.state == CprState::Running));
    assert!(snaps.iter().all(|s| s.shocks == 1));
    assert!(snaps.windows(2).all(|w| w[0].elapsed_ms <= w[1].elapsed_ms));
}

#[test]
fn test_no_tick_after_cancel() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let config = CprConfig {
        rate_window: 10,
        tick_interval_ms: 1,
    };
    let session = CprSession::system(&config).with_ticker(Arc::new(move |_: CprSnapshot| {
        thread::sleep(Duration::from_millis(2));
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    for _ in 0..5 {
        session.start();
        thread::sleep(Duration::from_millis(10));
        session.pause();
        let stopped_at = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(ticks.load(Ordering::SeqCst), stopped_at);
    }
}
