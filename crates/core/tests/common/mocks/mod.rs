/// A mocked [`Component`](nvsim_core::Component) child, for tests that need
/// to control exactly what a controller's next level accepts.
pub mod next_level;
