//! The IMC: read/write pending-queue arbitration in front of a single
//! child, with periodic ADR (Asynchronous DRAM Refresh) flushing.
//!
//! Two bounded queues, `wpq` and `rpq`, hold accepted-but-not-yet-forwarded
//! requests. Every tick picks one queue to forward from (favoring whichever
//! head arrived first, ties going to writes), and a full write queue
//! triggers an eager drain so writes never wedge the reads behind them
//! indefinitely.

use crate::common::{Clock, Request, RequestKind, Response};
use crate::component::Component;
use crate::config::Section;
use crate::queue::RequestQueue;
use crate::stats::{Counter, Dumper};

struct PendingEntry {
    req: Request,
}

/// The read/write pending-queue arbiter.
pub struct Imc {
    wpq: RequestQueue<PendingEntry>,
    rpq: RequestQueue<PendingEntry>,
    adr_epoch: u64,
    events: Counter,
    child: Box<dyn Component>,
}

impl Imc {
    /// Builds an IMC from its config section, forwarding arbitrated
    /// requests to `child`.
    pub fn new(section: &Section, child: Box<dyn Component>) -> Result<Self, crate::common::SimError> {
        Ok(Self {
            wpq: RequestQueue::new(section.get_usize("wpq_entries")?),
            rpq: RequestQueue::new(section.get_usize("rpq_entries")?),
            adr_epoch: section.get_u64_or("adr_epoch", 0)?,
            events: Counter::new(
                "imc",
                "events",
                &["read_access", "write_access", "wpq_full_flush", "adr_flush", "next_level_issue_fail"],
            ),
            child,
        })
    }

    fn forward(&mut self, entry: PendingEntry) -> bool {
        let resp = self.child.issue_request(entry.req);
        if !resp.accepted {
            self.events.incr("next_level_issue_fail");
        }
        resp.accepted
    }

    /// Drains `wpq` head-first while the next level accepts, stopping if
    /// `rpq`'s head is older than the current `wpq` head or the next level
    /// is full.
    fn flush_wpq(&mut self) {
        loop {
            let Some(write_front) = self.wpq.front() else { break };
            if let Some(read_front) = self.rpq.front() {
                if read_front.req.arrive < write_front.req.arrive {
                    break;
                }
            }
            if self.child.full() {
                break;
            }
            let Some(entry) = self.wpq.pop_front() else { break };
            if !self.forward(entry) {
                break;
            }
        }
    }
}

impl Component for Imc {
    fn issue_request(&mut self, req: Request) -> Response {
        let accepted = match req.kind {
            RequestKind::Write => self.wpq.enqueue(PendingEntry { req }),
            RequestKind::Read => self.rpq.enqueue(PendingEntry { req }),
        };
        Response {
            accepted,
            deterministic: false,
            next_clk: Clock::INVALID,
        }
    }

    fn tick_current(&mut self, clk: Clock) {
        let write_first = match (self.wpq.front(), self.rpq.front()) {
            (Some(w), Some(r)) => w.req.arrive <= r.req.arrive,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => false,
        };

        if !self.child.full() {
            if write_first {
                if let Some(entry) = self.wpq.pop_front() {
                    self.events.incr("write_access");
                    let _ = self.forward(entry);
                }
            } else if let Some(entry) = self.rpq.pop_front() {
                self.events.incr("read_access");
                let _ = self.forward(entry);
            }
        }

        if self.wpq.full() {
            self.events.incr("wpq_full_flush");
            self.flush_wpq();
        }

        if self.adr_epoch > 0 && (clk.0 + 1) % self.adr_epoch == 0 {
            self.events.incr("adr_flush");
            self.flush_wpq();
        }
    }

    fn tick_next(&mut self, clk: Clock) {
        self.child.tick(clk);
    }

    fn full(&self) -> bool {
        self.wpq.full() && self.rpq.full()
    }

    fn pending(&self) -> bool {
        self.wpq.pending() || self.rpq.pending() || self.child.pending()
    }

    fn drain_next(&mut self) {
        self.child.drain();
    }

    fn print_counters(&self, dumper: &mut Dumper) {
        dumper.record(&self.events);
        self.child.print_counters(dumper);
    }
}
