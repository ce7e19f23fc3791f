//! Request, response, and completion-callback types.
//!
//! Every component in the tree speaks the same request/response contract
//! (see the module-level docs on [`crate::component`]): a parent issues a
//! [`Request`] to a child and gets back a [`Response`] describing whether the
//! request was accepted and, if so, when it will complete. Requests that
//! outlive a single `issue_request` call (most of them do, since this is a
//! timing simulator, not a functional one) carry an optional [`Callback`]
//! that the owning controller invokes once the access actually finishes.

use crate::common::{Clock, LogicalAddr};

/// The kind of access a [`Request`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// A read access.
    Read,
    /// A write access.
    Write,
}

impl RequestKind {
    /// Returns whether this is a write request.
    #[inline]
    pub fn is_write(self) -> bool {
        matches!(self, RequestKind::Write)
    }
}

/// A boxed completion callback invoked with the completing address and the
/// clock at which the access finished.
///
/// Callbacks are constructed by cloning a reference-counted handle to the
/// buffer entry they need to update rather than capturing a raw pointer into
/// a hash map whose backing table may move on rehash; invoking the callback
/// is therefore always safe regardless of how many insertions happened to
/// the owning buffer in between.
pub type Callback = Box<dyn FnOnce(LogicalAddr, Clock)>;

/// A single memory access flowing down the component tree.
pub struct Request {
    /// The kind of access.
    pub kind: RequestKind,
    /// The logical address being accessed.
    pub addr: LogicalAddr,
    /// The clock at which this request was issued.
    pub arrive: Clock,
    /// Invoked once the access completes, if the issuing component needs to
    /// know (most do not pass one when only interested in the queueing
    /// decision returned by [`Response`]).
    pub callback: Option<Callback>,
}

impl Request {
    /// Creates a new request with no completion callback.
    pub fn new(kind: RequestKind, addr: LogicalAddr, arrive: Clock) -> Self {
        Self {
            kind,
            addr,
            arrive,
            callback: None,
        }
    }

    /// Attaches a completion callback, returning the updated request.
    pub fn with_callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }
}

/// The outcome of issuing a [`Request`] to a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Response {
    /// Whether the component accepted the request into its queue.
    pub accepted: bool,
    /// Whether `next_clk` is an exact completion time (`true`) or merely a
    /// lower bound that may slip later due to contention (`false`).
    pub deterministic: bool,
    /// The clock at which the request is expected to complete.
    pub next_clk: Clock,
}

impl Response {
    /// A response indicating the request was rejected (queue full).
    pub const REJECTED: Response = Response {
        accepted: false,
        deterministic: false,
        next_clk: Clock::INVALID,
    };

    /// Builds an accepted, deterministic response completing at `next_clk`.
    pub fn accepted_at(next_clk: Clock) -> Self {
        Response {
            accepted: true,
            deterministic: true,
            next_clk,
        }
    }

    /// Builds an accepted, non-deterministic response with a lower-bound
    /// completion estimate.
    pub fn accepted_estimate(next_clk: Clock) -> Self {
        Response {
            accepted: true,
            deterministic: false,
            next_clk,
        }
    }
}
