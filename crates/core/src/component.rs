//! The `Component` trait every node in the simulated tree implements.
//!
//! A component bundles a controller's policy with whatever local timing
//! model (media) it owns. The tree is built once at startup from the config
//! and is otherwise immutable: each node owns its children outright (a
//! `Vec<Box<dyn Component>>` or a single boxed child), so the tree is a
//! plain Rust ownership tree rather than an arena of integer-indexed nodes —
//! there are no cycles to guard against, since ownership already rules them
//! out.
//!
//! Ticking follows the same split as the controllers' own state machines:
//! [`Component::tick_current`] advances this node's own queues and buffers,
//! then the default [`Component::tick`] recurses into children via
//! [`Component::tick_next`].

use crate::common::{Clock, Request, Response};
use crate::stats::Dumper;

/// A node in the simulated component tree.
pub trait Component {
    /// Issues a request to this component, returning whether it was
    /// accepted and, if so, when it will complete.
    fn issue_request(&mut self, req: Request) -> Response;

    /// Advances this component's own controller and media by one tick.
    fn tick_current(&mut self, clk: Clock);

    /// Advances this component's children by one tick. Leaf components use
    /// the default no-op.
    fn tick_next(&mut self, _clk: Clock) {}

    /// Advances this component (and, transitively, its children) by one
    /// tick: own state first, then children, matching the controller-then-
    /// media-then-children ordering used throughout the tree.
    fn tick(&mut self, clk: Clock) {
        self.tick_current(clk);
        self.tick_next(clk);
    }

    /// Returns whether this component cannot currently accept new requests.
    fn full(&self) -> bool;

    /// Returns whether this component has any in-flight work left.
    fn pending(&self) -> bool;

    /// Flushes dirty state back toward the media, as if powering down under
    /// a persistence guarantee (ADR-style). The default is a no-op for
    /// components with no dirty state of their own.
    fn drain_current(&mut self) {}

    /// Recursively drains this component's children. Leaf components use
    /// the default no-op.
    fn drain_next(&mut self) {}

    /// Recursively drains this component and its children.
    fn drain(&mut self) {
        self.drain_current();
        self.drain_next();
    }

    /// Writes this component's counters (and, transitively, its children's)
    /// into `dumper`.
    fn print_counters(&self, dumper: &mut Dumper);
}
