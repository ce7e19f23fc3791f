/// Builds a runnable [`Simulator`](nvsim_core::Simulator) tree from config
/// text, for tests that drive the whole stack end to end.
pub mod harness;

/// Mocked [`Component`](nvsim_core::Component) children for tests that want
/// to isolate one controller's arbitration logic from real media timing.
pub mod mocks;
