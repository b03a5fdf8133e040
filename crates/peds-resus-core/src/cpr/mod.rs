//! CPR session timing.
//!
//! - [`CprTimer`]: the state machine (Idle → Running ⇄ Paused → Idle), event
//!   log and compression rate
//! - [`CprSession`]: a shared timer plus a cancellable periodic ticker
//! - [`Clock`]: time source, real or simulated

mod clock;
mod session;
mod timer;

pub use clock::*;
pub use session::*;
pub use timer::*;
