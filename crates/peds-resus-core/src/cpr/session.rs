//! CPR session with a periodic ticker.
//!
//! The ticker thread delivers a [`CprSnapshot`] every tick interval while the
//! timer runs. Cancellation is synchronous: once `pause`, `reset` or drop
//! returns, no further callback runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tracing::{debug, warn};

use super::{Clock, CprEvent, CprEventKind, CprSnapshot, CprState, CprTimer, SystemClock};
use crate::config::CprConfig;

/// Receives ticker snapshots.
pub type TickCallback = Arc<dyn Fn(CprSnapshot) + Send + Sync>;

struct TickerShared {
    cancelled: AtomicBool,
    /// Held by the ticker thread except while it waits
    gate: Mutex<()>,
    wake: Condvar,
}

struct Ticker {
    shared: Arc<TickerShared>,
    thread_id: ThreadId,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn spawn<C: Clock + 'static>(
        timer: Arc<Mutex<CprTimer<C>>>,
        interval: Duration,
        on_tick: TickCallback,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(TickerShared {
            cancelled: AtomicBool::new(false),
            gate: Mutex::new(()),
            wake: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("cpr-ticker".into())
            .spawn(move || run_ticker(&thread_shared, &timer, interval, &on_tick))?;
        Ok(Self {
            shared,
            thread_id: handle.thread().id(),
            handle,
        })
    }

    /// Stop the ticker. No callback runs after this returns.
    fn cancel(self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        if thread::current().id() == self.thread_id {
            // Called from inside a callback; the loop exits once it returns
            return;
        }
        // Waits out a callback in flight
        drop(self.shared.gate.lock().unwrap_or_else(PoisonError::into_inner));
        self.shared.wake.notify_all();
        if self.handle.join().is_err() {
            warn!("CPR ticker thread panicked");
        }
    }
}

fn run_ticker<C: Clock>(
    shared: &TickerShared,
    timer: &Mutex<CprTimer<C>>,
    interval: Duration,
    on_tick: &TickCallback,
) {
    let mut gate = shared.gate.lock().unwrap_or_else(PoisonError::into_inner);
    while !shared.cancelled.load(Ordering::SeqCst) {
        let (guard, wait) = shared
            .wake
            .wait_timeout(gate, interval)
            .unwrap_or_else(PoisonError::into_inner);
        gate = guard;
        if shared.cancelled.load(Ordering::SeqCst) {
            break;
        }
        if wait.timed_out() {
            let snapshot = lock(timer).snapshot();
            on_tick(snapshot);
        }
    }
    debug!("CPR ticker stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A CPR timer shared with an optional ticker.
pub struct CprSession<C: Clock + 'static = SystemClock> {
    timer: Arc<Mutex<CprTimer<C>>>,
    ticker: Mutex<Option<Ticker>>,
    interval: Duration,
    on_tick: Mutex<Option<TickCallback>>,
}

impl CprSession<SystemClock> {
    /// Session on the system clock.
    pub fn system(config: &CprConfig) -> Self {
        Self::new(SystemClock::new(), config)
    }
}

impl<C: Clock + 'static> CprSession<C> {
    pub fn new(clock: C, config: &CprConfig) -> Self {
        Self {
            timer: Arc::new(Mutex::new(CprTimer::new(clock, config.rate_window))),
            ticker: Mutex::new(None),
            interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            on_tick: Mutex::new(None),
        }
    }

    /// Deliver snapshots to `on_tick` while the session runs.
    pub fn with_ticker(self, on_tick: TickCallback) -> Self {
        *lock(&self.on_tick) = Some(on_tick);
        self
    }

    /// Replace or remove the tick callback.
    ///
    /// A running session switches to the new callback right away; the old one
    /// receives no further snapshots once this returns.
    pub fn set_ticker(&self, on_tick: Option<TickCallback>) {
        self.cancel_ticker();
        *lock(&self.on_tick) = on_tick;
        if lock(&self.timer).state() == CprState::Running {
            self.spawn_ticker();
        }
    }

    pub fn start(&self) -> bool {
        let started = lock(&self.timer).start();
        if started {
            self.spawn_ticker();
        }
        started
    }

    pub fn pause(&self) -> bool {
        self.cancel_ticker();
        lock(&self.timer).pause()
    }

    pub fn reset(&self) {
        self.cancel_ticker();
        lock(&self.timer).reset();
    }

    pub fn record(&self, kind: CprEventKind) -> Option<CprEvent> {
        lock(&self.timer).record(kind)
    }

    pub fn snapshot(&self) -> CprSnapshot {
        lock(&self.timer).snapshot()
    }

    pub fn events(&self) -> Vec<CprEvent> {
        lock(&self.timer).events().to_vec()
    }

    /// Whether a ticker thread is currently attached.
    pub fn is_ticking(&self) -> bool {
        lock(&self.ticker).is_some()
    }

    fn spawn_ticker(&self) {
        let Some(on_tick) = lock(&self.on_tick).clone() else {
            return;
        };
        let mut slot = lock(&self.ticker);
        if slot.is_some() {
            return;
        }
        match Ticker::spawn(Arc::clone(&self.timer), self.interval, on_tick) {
            Ok(ticker) => *slot = Some(ticker),
            Err(e) => warn!("Could not start CPR ticker: {}", e),
        }
    }

    fn cancel_ticker(&self) {
        let ticker = lock(&self.ticker).take();
        if let Some(ticker) = ticker {
            ticker.cancel();
        }
    }
}

impl<C: Clock + 'static> Drop for CprSession<C> {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}
