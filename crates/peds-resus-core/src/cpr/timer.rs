//! CPR session state machine.

use serde::{Deserialize, Serialize};

use super::{Clock, SystemClock};

/// Default number of compressions considered by the rate calculation.
pub const DEFAULT_RATE_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CprState {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CprEventKind {
    Compression,
    Epinephrine,
    Shock,
}

/// An event, stamped with session elapsed time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CprEvent {
    pub kind: CprEventKind,
    pub time_ms: u64,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CprSnapshot {
    pub state: CprState,
    pub elapsed_ms: u64,
    pub compressions: usize,
    pub epinephrine_doses: usize,
    pub shocks: usize,
    /// Compressions per minute over the recent window
    pub compression_rate: Option<f64>,
    pub since_last_epinephrine_ms: Option<u64>,
    pub since_last_shock_ms: Option<u64>,
}

/// CPR session timer.
///
/// Elapsed time is always `now - anchor + accumulated`, so pausing and
/// resuming never loses or double-counts time.
#[derive(Debug)]
pub struct CprTimer<C: Clock = SystemClock> {
    clock: C,
    state: CprState,
    /// Clock reading when the current running span began
    anchor_ms: u64,
    /// Time folded in from earlier running spans
    accumulated_ms: u64,
    events: Vec<CprEvent>,
    rate_window: usize,
}

impl CprTimer<SystemClock> {
    pub fn system() -> Self {
        Self::new(SystemClock::new(), DEFAULT_RATE_WINDOW)
    }
}

impl<C: Clock> CprTimer<C> {
    /// Create an idle timer. The rate window is at least two compressions.
    pub fn new(clock: C, rate_window: usize) -> Self {
        Self {
            clock,
            state: CprState::Idle,
            anchor_ms: 0,
            accumulated_ms: 0,
            events: Vec::new(),
            rate_window: rate_window.max(2),
        }
    }

    pub fn state(&self) -> CprState {
        self.state
    }

    /// Idle/Paused → Running. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.state == CprState::Running {
            return false;
        }
        self.anchor_ms = self.clock.now_ms();
        self.state = CprState::Running;
        true
    }

    /// Running → Paused. Returns false if not running.
    pub fn pause(&mut self) -> bool {
        if self.state != CprState::Running {
            return false;
        }
        self.accumulated_ms = self.elapsed_ms();
        self.state = CprState::Paused;
        true
    }

    /// Clear elapsed time and the event log, returning to Idle.
    pub fn reset(&mut self) {
        self.state = CprState::Idle;
        self.anchor_ms = 0;
        self.accumulated_ms = 0;
        self.events.clear();
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self.state {
            CprState::Running => {
                self.accumulated_ms + self.clock.now_ms().saturating_sub(self.anchor_ms)
            }
            CprState::Idle | CprState::Paused => self.accumulated_ms,
        }
    }

    /// Record an event. Only while running; otherwise a no-op.
    pub fn record(&mut self, kind: CprEventKind) -> Option<CprEvent> {
        if self.state != CprState::Running {
            return None;
        }
        let event = CprEvent {
            kind,
            time_ms: self.elapsed_ms(),
        };
        self.events.push(event);
        Some(event)
    }

    pub fn events(&self) -> &[CprEvent] {
        &self.events
    }

    pub fn count(&self, kind: CprEventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Compressions per minute over the most recent compressions.
    ///
    /// `None` with fewer than two compressions in the window.
    pub fn compression_rate(&self) -> Option<f64> {
        let mut recent: Vec<u64> = self
            .events
            .iter()
            .rev()
            .filter(|e| e.kind == CprEventKind::Compression)
            .take(self.rate_window)
            .map(|e| e.time_ms)
            .collect();
        if recent.len() < 2 {
            return None;
        }
        recent.reverse();
        let span = recent[recent.len() - 1] - recent[0];
        if span == 0 {
            return None;
        }
        Some((recent.len() - 1) as f64 * 60_000.0 / span as f64)
    }

    /// Time since the most recent event of a kind.
    pub fn time_since_last(&self, kind: CprEventKind) -> Option<u64> {
        let last = self.events.iter().rev().find(|e| e.kind == kind)?;
        Some(self.elapsed_ms().saturating_sub(last.time_ms))
    }

    pub fn snapshot(&self) -> CprSnapshot {
        CprSnapshot {
            state: self.state,
            elapsed_ms: self.elapsed_ms(),
            compressions: self.count(CprEventKind::Compression),
            epinephrine_doses: self.count(CprEventKind::Epinephrine),
            shocks: self.count(CprEventKind::Shock),
            compression_rate: self.compression_rate(),
            since_last_epinephrine_ms: self.time_since_last(CprEventKind::Epinephrine),
            since_last_shock_ms: self.time_since_last(CprEventKind::Shock),
        }
    }
}
