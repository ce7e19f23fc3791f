//! Constant-latency media, standing in for a fast local memory (or, inside
//! the RMW controller, for the persistent media itself).
//!
//! This is the simplest possible [`Component`]: it has no queue, no state,
//! and answers every request immediately with a deterministic completion
//! clock. It never rejects a request and is never `pending`.

use crate::common::{Clock, Request, RequestKind, Response};
use crate::component::Component;
use crate::stats::Dumper;

/// A fixed-latency memory model.
pub struct StaticMedia {
    read_latency: u64,
    write_latency: u64,
}

impl StaticMedia {
    /// Creates a static media model with the given per-kind latencies.
    pub fn new(read_latency: u64, write_latency: u64) -> Self {
        Self {
            read_latency,
            write_latency,
        }
    }
}

impl Component for StaticMedia {
    fn issue_request(&mut self, req: Request) -> Response {
        let latency = match req.kind {
            RequestKind::Read => self.read_latency,
            RequestKind::Write => self.write_latency,
        };
        Response::accepted_at(req.arrive + latency)
    }

    fn tick_current(&mut self, _clk: Clock) {}

    fn full(&self) -> bool {
        false
    }

    fn pending(&self) -> bool {
        false
    }

    fn print_counters(&self, _dumper: &mut Dumper) {}
}
