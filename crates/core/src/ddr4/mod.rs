//! DDR4 command-level media model.
//!
//! This is the timing core of the simulator: a per-bank/per-rank state
//! machine that decodes each request into a sequence of DDR4 commands,
//! checks them against a timing table, and issues them with FR-FCFS-ish
//! arbitration across four queues (activate, miscellaneous/refresh, read,
//! write).
//!
//! 1. **timing** — the command/level vocabulary, the timing table, and the
//!    prerequisite-substitution rules.
//! 2. **media** — the queues, per-bank state, and the scheduling loop.

/// Command, level, and timing-table types.
pub mod timing;

/// The scheduler and queue-backed [`Component`](crate::component::Component)
/// implementation.
pub mod media;

pub use media::{Ddr4Media, Geometry};
pub use timing::{Command, Ddr4Timing, Level};
