//! Domain models for the resuscitation reference core.

mod algorithm;
mod equipment;
mod medication;
mod patient;
mod vitals;

pub use algorithm::*;
pub use equipment::*;
pub use medication::*;
pub use patient::*;
pub use vitals::*;
