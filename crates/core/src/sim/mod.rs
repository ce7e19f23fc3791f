//! Top-level simulation driver: owns the component tree and the trace, and
//! advances the clock until both are exhausted.

pub mod simulator;

pub use simulator::Simulator;
