//! Time subsystem.
//!
//! Frame-budgeted work reads time through the [`Clock`] trait so hosts and
//! tests can substitute a deterministic clock:
//! - [`SystemClock`] reads `Instant::now()`
//! - [`ManualClock`] only moves when advanced explicitly

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};
