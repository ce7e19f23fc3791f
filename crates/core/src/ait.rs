//! The AIT (Address Indirection Table) controller: a 4096-byte wear-leveling
//! remap buffer sitting behind the RMW controller, fronting the real DDR4
//! metadata store and caching resolved entries in a small local DRAM.
//!
//! Structurally this mirrors [`crate::rmw`]: a bounded LSQ, an
//! [`EntryBuffer`] keyed by AIT block address, and a per-entry state machine
//! advanced by [`Ait::advance_entry`]. Two things set it apart: there is no
//! read patching or write combining (an access either hits or misses a
//! resident entry, full stop), and every local-memory step is split into
//! four 64-byte LMEMQ sub-accesses rather than one.

use std::rc::Rc;

use crate::buffer::{EntryBuffer, EntryHandle};
use crate::common::{AitBlockAddr, Callback, Clock, LogicalAddr, Request, RequestKind, Response};
use crate::component::Component;
use crate::config::Section;
use crate::queue::RequestQueue;
use crate::static_media::StaticMedia;
use crate::stats::{Counter, Dumper};

/// The kind of access an AIT buffer entry currently represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AitRequestType {
    ReadHit,
    ReadMiss,
    WriteHit,
    WriteMiss,
    WriteBack,
}

/// The state of one AIT buffer entry's transition through the metadata
/// store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AitState {
    Init,
    PendingReadMedia,
    PendingWriteMedia,
    PendingReadDram,
    PendingWriteDram,
    PendingMigration,
    End,
}

struct PendingRequest {
    kind: AitRequestType,
    rmw_index: usize,
}

/// A 4096-byte AIT buffer entry.
pub struct AitEntry {
    last_used_clk: Clock,
    next_action_clk: Clock,
    pending: bool,
    valid_to_read: bool,
    dirty: bool,
    waiting_action_clk_update: bool,
    rmw_bitmap: u16,
    callback: Option<Callback>,
    write_count: u64,
    subreq_index: usize,
    state: AitState,
    pending_request: Option<PendingRequest>,
}

impl AitEntry {
    fn new() -> Self {
        Self {
            last_used_clk: Clock(0),
            next_action_clk: Clock::INVALID,
            pending: false,
            valid_to_read: false,
            dirty: false,
            waiting_action_clk_update: false,
            rmw_bitmap: 0,
            callback: None,
            write_count: 0,
            subreq_index: 0,
            state: AitState::Init,
            pending_request: None,
        }
    }

    fn assign_new_request(&mut self, kind: AitRequestType, rmw_index: usize) {
        assert!(!self.pending, "assign_new_request on a still-pending AIT entry");
        self.pending_request = Some(PendingRequest { kind, rmw_index });
        self.state = AitState::Init;
        self.pending = true;
        self.subreq_index = 0;
        self.waiting_action_clk_update = false;
        self.next_action_clk = Clock(0);
    }
}

struct LsqEntry {
    kind: RequestKind,
    addr: LogicalAddr,
    callback: Option<Callback>,
}

/// The AIT controller, its local metadata-cache media (accessed through the
/// LMEMQ sub-request splitter), and the DDR4 child it resolves indirection
/// entries against.
pub struct Ait {
    lsq: RequestQueue<LsqEntry>,
    lmemq_entries: usize,
    lmemq_inflight: usize,
    buffer: EntryBuffer<AitBlockAddr, AitEntry>,
    wear_leveling_threshold: u64,
    migration_block_entries: u64,
    migration_latency: u64,
    events: Counter,
    local: StaticMedia,
    next: Box<dyn Component>,
}

impl Ait {
    /// Builds an AIT controller from its config section, owning `local` (the
    /// DRAM metadata cache reached via LMEMQ) and forwarding indirection
    /// resolution traffic to `next` (the DDR4 media).
    pub fn new(section: &Section, local: StaticMedia, next: Box<dyn Component>) -> Result<Self, crate::common::SimError> {
        Ok(Self {
            lsq: RequestQueue::new(section.get_usize("lsq_entries")?),
            lmemq_entries: section.get_usize("lmemq_entries")?,
            lmemq_inflight: 0,
            buffer: EntryBuffer::new(section.get_usize("buffer_entries")?),
            wear_leveling_threshold: section.get_u64("wear_leveling_threshold")?,
            migration_block_entries: section.get_u64("migration_block_entries")?,
            migration_latency: section.get_u64("migration_latency")?,
            events: Counter::new(
                "ait",
                "events",
                &[
                    "read_access",
                    "write_access",
                    "eviction",
                    "read_hit",
                    "read_miss",
                    "write_hit",
                    "write_miss",
                    "write_back",
                    "migration",
                    "next_level_issue_fail",
                    "local_memory_issue_fail",
                ],
            ),
            local,
            next,
        })
    }

    fn check_and_evict(&mut self, _clk: Clock) -> bool {
        if !self.buffer.full() {
            return true;
        }
        let victim = self.buffer.least_recently_used(|e| e.state == AitState::End, |e| e.last_used_clk.0);
        match victim {
            Some(key) => {
                let _ = self.buffer.remove(key);
                self.events.incr("eviction");
                true
            }
            None => false,
        }
    }

    fn process_lsq(&mut self, clk: Clock) {
        let Some(front) = self.lsq.front() else { return };
        let kind = front.kind;
        let block = front.addr.ait_block();
        let rmw_index = front.addr.ait_rmw_index();

        if let Some(handle) = self.buffer.get(block) {
            if handle.borrow().pending {
                return;
            }
            let Some(entry) = self.lsq.pop_front() else { return };
            let req_type = match kind {
                RequestKind::Read => AitRequestType::ReadHit,
                RequestKind::Write => AitRequestType::WriteHit,
            };
            let mut e = handle.borrow_mut();
            e.assign_new_request(req_type, rmw_index);
            e.callback = entry.callback;
            e.rmw_bitmap |= 1 << rmw_index;
            e.last_used_clk = clk;
            if kind.is_write() {
                e.dirty = true;
                e.write_count += 1;
            }
            drop(e);
            self.events.incr(if kind.is_write() { "write_access" } else { "read_access" });
            self.events.incr(if kind.is_write() { "write_hit" } else { "read_hit" });
            return;
        }

        if self.check_and_evict(clk) {
            let Some(entry) = self.lsq.pop_front() else { return };
            let Some(handle) = self.buffer.insert(block, AitEntry::new()) else { return };
            let req_type = match kind {
                RequestKind::Read => AitRequestType::ReadMiss,
                RequestKind::Write => AitRequestType::WriteMiss,
            };
            let mut e = handle.borrow_mut();
            e.assign_new_request(req_type, rmw_index);
            e.callback = entry.callback;
            e.rmw_bitmap = 1 << rmw_index;
            e.last_used_clk = clk;
            if kind.is_write() {
                e.dirty = true;
                e.write_count += 1;
            }
            drop(e);
            self.events.incr(if kind.is_write() { "write_access" } else { "read_access" });
            self.events.incr(if kind.is_write() { "write_miss" } else { "read_miss" });
        }
    }

    fn issue_next_level(&mut self, kind: RequestKind, addr: LogicalAddr, clk: Clock, handle: &EntryHandle<AitEntry>) -> bool {
        let on_complete = Rc::clone(handle);
        let callback: Callback = Box::new(move |_addr, clk| {
            let mut e = on_complete.borrow_mut();
            e.waiting_action_clk_update = false;
            e.next_action_clk = clk + 1;
        });
        let resp = self.next.issue_request(Request::new(kind, addr, clk).with_callback(callback));
        if !resp.accepted {
            self.events.incr("next_level_issue_fail");
            return false;
        }
        let mut e = handle.borrow_mut();
        e.waiting_action_clk_update = !resp.deterministic;
        e.next_action_clk = if resp.deterministic { resp.next_clk + 1 } else { Clock::INVALID };
        true
    }

    /// Drives one LMEMQ sub-request (of the four 64-byte accesses a single
    /// local-memory step is split into) to completion, returning `true` once
    /// all four have served.
    fn issue_lmemq(&mut self, kind: RequestKind, addr: LogicalAddr, clk: Clock, handle: &EntryHandle<AitEntry>) -> bool {
        let starting = handle.borrow().subreq_index == 0;
        if starting && self.lmemq_inflight >= self.lmemq_entries {
            self.events.incr("local_memory_issue_fail");
            return false;
        }
        let sub_addr = LogicalAddr(addr.val() + (handle.borrow().subreq_index as u64) * 64);
        let resp = self.local.issue_request(Request::new(kind, sub_addr, clk));
        if !resp.accepted {
            self.events.incr("local_memory_issue_fail");
            return false;
        }
        if starting {
            self.lmemq_inflight += 1;
        }
        let mut e = handle.borrow_mut();
        e.subreq_index += 1;
        if e.subreq_index >= 4 {
            e.subreq_index = 0;
            e.waiting_action_clk_update = false;
            e.next_action_clk = resp.next_clk + 1;
            drop(e);
            self.lmemq_inflight -= 1;
            true
        } else {
            e.waiting_action_clk_update = false;
            e.next_action_clk = clk;
            false
        }
    }

    fn check_wear_leveling(&mut self, write_count: u64, clk: Clock, handle: &EntryHandle<AitEntry>) {
        let migrating = self.wear_leveling_threshold > 0 && (write_count + 1) % self.wear_leveling_threshold == 0;
        let mut e = handle.borrow_mut();
        e.waiting_action_clk_update = false;
        e.next_action_clk = if migrating {
            self.events.incr("migration");
            clk + 1 + self.migration_latency * self.migration_block_entries
        } else {
            clk + 1
        };
    }

    fn advance_entry(&mut self, key: AitBlockAddr, handle: EntryHandle<AitEntry>, clk: Clock) {
        let (waiting, pending, next_action_clk, state) = {
            let e = handle.borrow();
            (e.waiting_action_clk_update, e.pending, e.next_action_clk, e.state)
        };
        if state != AitState::Init {
            if !pending || waiting {
                return;
            }
            if next_action_clk.is_valid() && next_action_clk > clk {
                return;
            }
        }

        let Some(req_type) = handle.borrow().pending_request.as_ref().map(|p| p.kind) else { return };
        let logical_addr = LogicalAddr(key.val());

        use AitRequestType::*;
        use AitState::*;
        match (req_type, state) {
            (ReadMiss, Init) => {
                if self.issue_next_level(RequestKind::Read, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingReadMedia;
                }
            }
            (ReadMiss, PendingReadMedia) => {
                handle.borrow_mut().state = PendingWriteDram;
            }
            (ReadMiss, PendingWriteDram) => {
                if self.issue_lmemq(RequestKind::Write, logical_addr, clk, &handle) {
                    let mut e = handle.borrow_mut();
                    e.state = End;
                    e.valid_to_read = true;
                    e.pending = false;
                    let cb = e.callback.take();
                    drop(e);
                    if let Some(cb) = cb {
                        cb(logical_addr, clk);
                    }
                }
            }
            (ReadHit, Init) => {
                if self.issue_lmemq(RequestKind::Read, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingReadDram;
                }
            }
            (ReadHit, PendingReadDram) => {
                let mut e = handle.borrow_mut();
                e.state = End;
                e.pending = false;
                let cb = e.callback.take();
                drop(e);
                if let Some(cb) = cb {
                    cb(logical_addr, clk);
                }
            }
            (WriteMiss, Init) | (WriteHit, Init) => {
                if self.issue_lmemq(RequestKind::Write, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingWriteDram;
                }
            }
            (WriteMiss, PendingWriteDram) | (WriteHit, PendingWriteDram) => {
                if self.issue_next_level(RequestKind::Write, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingWriteMedia;
                }
            }
            (WriteMiss, PendingWriteMedia) | (WriteHit, PendingWriteMedia) => {
                let write_count = handle.borrow().write_count;
                handle.borrow_mut().state = PendingMigration;
                self.check_wear_leveling(write_count, clk, &handle);
            }
            (WriteMiss, PendingMigration) | (WriteHit, PendingMigration) => {
                let mut e = handle.borrow_mut();
                e.state = End;
                e.dirty = false;
                e.pending = false;
                e.valid_to_read = true;
                let cb = e.callback.take();
                drop(e);
                if let Some(cb) = cb {
                    cb(logical_addr, clk);
                }
            }
            (WriteBack, Init) => {
                if self.issue_next_level(RequestKind::Write, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingWriteMedia;
                }
            }
            (WriteBack, PendingWriteMedia) => {
                let _ = self.buffer.remove(key);
                self.events.incr("write_back");
            }
            _ => {}
        }
    }
}

impl Component for Ait {
    fn issue_request(&mut self, req: Request) -> Response {
        let kind = req.kind;
        let addr = req.addr;
        let callback = req.callback;
        let accepted = self.lsq.enqueue(LsqEntry { kind, addr, callback });
        Response {
            accepted,
            deterministic: false,
            next_clk: Clock::INVALID,
        }
    }

    fn tick_current(&mut self, clk: Clock) {
        self.process_lsq(clk);
        let keys: Vec<AitBlockAddr> = self.buffer.iter().map(|(k, _)| k).collect();
        for key in keys {
            if let Some(handle) = self.buffer.get(key) {
                self.advance_entry(key, handle, clk);
            }
        }
    }

    fn tick_next(&mut self, clk: Clock) {
        self.next.tick(clk);
    }

    fn full(&self) -> bool {
        self.lsq.full()
    }

    fn pending(&self) -> bool {
        self.lsq.pending() || self.buffer.any(|e| e.pending) || self.next.pending()
    }

    fn drain_current(&mut self) {
        let keys: Vec<AitBlockAddr> = self.buffer.iter().map(|(k, _)| k).collect();
        for key in keys {
            if let Some(handle) = self.buffer.get(key) {
                let mut e = handle.borrow_mut();
                if e.state == AitState::End && e.dirty {
                    e.pending_request = Some(PendingRequest { kind: AitRequestType::WriteBack, rmw_index: 0 });
                    e.state = AitState::Init;
                    e.pending = true;
                    e.subreq_index = 0;
                    e.waiting_action_clk_update = false;
                    e.next_action_clk = Clock(0);
                }
            }
        }
    }

    fn drain_next(&mut self) {
        self.next.drain();
    }

    fn print_counters(&self, dumper: &mut Dumper) {
        dumper.record(&self.events);
        self.next.print_counters(dumper);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::config::RootConfig;

    fn ait_section(extra: &str) -> Section {
        let text = format!(
            "[ait]\n\
             lsq_entries: 8\n\
             lmemq_entries: 4\n\
             buffer_entries: 4\n\
             wear_leveling_threshold: 0\n\
             migration_block_entries: 2\n\
             migration_latency: 3\n\
             {extra}\n"
        );
        RootConfig::parse(&text).unwrap().section("ait").unwrap().clone()
    }

    fn build(section: &Section, local_latency: u64, next_latency: u64) -> Ait {
        Ait::new(
            section,
            StaticMedia::new(local_latency, local_latency),
            Box::new(StaticMedia::new(next_latency, next_latency)),
        )
        .unwrap()
    }

    fn run_to_quiescence(ait: &mut Ait, max_ticks: u64) {
        for t in 0..max_ticks {
            if !ait.pending() {
                return;
            }
            ait.tick_current(Clock(t));
        }
        panic!("ait did not quiesce within {max_ticks} ticks");
    }

    fn request_with_flag(kind: RequestKind, addr: u64) -> (Request, Rc<Cell<bool>>) {
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        let req = Request::new(kind, LogicalAddr(addr), Clock(0))
            .with_callback(Box::new(move |_addr, _clk| flag.set(true)));
        (req, done)
    }

    #[test]
    fn read_miss_completes_and_fires_callback() {
        let section = ait_section("");
        let mut ait = build(&section, 2, 4);
        let (req, done) = request_with_flag(RequestKind::Read, 0);

        assert!(ait.issue_request(req).accepted);
        run_to_quiescence(&mut ait, 100);

        assert!(done.get(), "read miss never completed");
        assert_eq!(ait.events.get("read_access"), 1);
        assert_eq!(ait.events.get("read_miss"), 1);
    }

    #[test]
    fn a_second_write_to_a_resident_block_is_a_hit() {
        let section = ait_section("");
        let mut ait = build(&section, 1, 2);

        let (first, done_first) = request_with_flag(RequestKind::Write, 0);
        assert!(ait.issue_request(first).accepted);
        run_to_quiescence(&mut ait, 100);
        assert!(done_first.get());

        let (second, done_second) = request_with_flag(RequestKind::Write, 256);
        assert!(ait.issue_request(second).accepted);
        run_to_quiescence(&mut ait, 100);
        assert!(done_second.get());

        assert_eq!(ait.events.get("write_miss"), 1);
        assert_eq!(ait.events.get("write_hit"), 1);
        let handle = ait.buffer.get(AitBlockAddr(0)).expect("block should be buffered");
        assert_eq!(handle.borrow().rmw_bitmap, 0b11);
    }

    #[test]
    fn every_write_migrates_when_the_threshold_is_one() {
        let section = ait_section("wear_leveling_threshold: 1\n");
        let mut ait = build(&section, 1, 2);
        let (req, done) = request_with_flag(RequestKind::Write, 0);

        assert!(ait.issue_request(req).accepted);
        run_to_quiescence(&mut ait, 100);

        assert!(done.get());
        assert_eq!(ait.events.get("migration"), 1);
    }

    #[test]
    fn a_second_distinct_block_evicts_the_least_recently_used_clean_entry() {
        let section = ait_section("buffer_entries: 1\n");
        let mut ait = build(&section, 1, 1);

        let (req_a, done_a) = request_with_flag(RequestKind::Read, 0);
        assert!(ait.issue_request(req_a).accepted);
        run_to_quiescence(&mut ait, 100);
        assert!(done_a.get());

        let (req_b, done_b) = request_with_flag(RequestKind::Read, 4096);
        assert!(ait.issue_request(req_b).accepted);
        run_to_quiescence(&mut ait, 100);
        assert!(done_b.get());

        assert_eq!(ait.events.get("eviction"), 1);
        assert_eq!(ait.events.get("read_access"), 2);
    }
}
