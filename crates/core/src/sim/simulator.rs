//! Drives one run: issues trace entries against a component tree and
//! advances the clock until the trace is exhausted and the tree quiesces.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::common::{Clock, LogicalAddr, Request, RequestKind};
use crate::component::Component;
use crate::stats::Dumper;
use crate::trace::{TraceEntry, TraceOp};

/// Owns the component tree for the duration of one trace run.
pub struct Simulator {
    tree: Box<dyn Component>,
    clk: Clock,
}

impl Simulator {
    /// Wraps an already-built component tree.
    pub fn new(tree: Box<dyn Component>) -> Self {
        Self { tree, clk: Clock(0) }
    }

    /// Issues every entry in `trace` in order, retrying rejected entries on
    /// the following tick, then keeps ticking until the tree reports
    /// `pending() == false`. Returns the clock at which the run finished.
    pub fn run(&mut self, trace: &[TraceEntry]) -> Clock {
        let mut entries = trace.iter();
        let mut current = entries.next();
        let mut idle_remaining = 0u64;
        let mut awaiting_critical: Option<Rc<Cell<bool>>> = None;

        loop {
            if let Some(flag) = &awaiting_critical {
                if flag.get() {
                    awaiting_critical = None;
                } else {
                    self.tick();
                    continue;
                }
            }

            if idle_remaining > 0 {
                idle_remaining -= 1;
                self.tick();
                continue;
            }

            match current {
                Some(entry) => {
                    if let Some(flag) = self.issue(entry) {
                        idle_remaining = entry.idle_cycles;
                        if entry.op == TraceOp::CriticalRead {
                            awaiting_critical = Some(flag);
                        }
                        current = entries.next();
                    } else {
                        debug!(addr = entry.addr, "request rejected, retrying next tick");
                    }
                    self.tick();
                }
                None => {
                    if !self.tree.pending() {
                        break;
                    }
                    self.tick();
                }
            }
        }

        self.clk
    }

    fn tick(&mut self) {
        trace!(clk = self.clk.0, "tick");
        self.tree.tick(self.clk);
        self.clk = self.clk + 1;
    }

    /// Issues one trace entry, returning a completion flag on acceptance
    /// (always set already for deterministic non-critical accesses, since
    /// nothing waits on it in that case).
    fn issue(&mut self, entry: &TraceEntry) -> Option<Rc<Cell<bool>>> {
        let kind = match entry.op {
            TraceOp::Read | TraceOp::CriticalRead => RequestKind::Read,
            TraceOp::Write => RequestKind::Write,
        };
        let done = Rc::new(Cell::new(false));
        let req = if entry.op == TraceOp::CriticalRead {
            let done = Rc::clone(&done);
            Request::new(kind, LogicalAddr(entry.addr), self.clk)
                .with_callback(Box::new(move |_addr, _clk| done.set(true)))
        } else {
            Request::new(kind, LogicalAddr(entry.addr), self.clk)
        };

        if self.tree.issue_request(req).accepted {
            Some(done)
        } else {
            None
        }
    }

    /// Writes the component tree's counters into `dumper`.
    pub fn print_counters(&self, dumper: &mut Dumper) {
        self.tree.print_counters(dumper);
    }

    /// Returns the clock the run finished at (or has reached so far).
    pub fn clock(&self) -> Clock {
        self.clk
    }
}
