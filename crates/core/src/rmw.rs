//! The RMW (read-modify-write) controller: a 256-byte write-combining
//! buffer fronting the persistent media, with read fast-forwarding and LRU
//! eviction.
//!
//! This is one of the three controllers that actually drives observable
//! timing (alongside [`crate::ait`] and [`crate::ddr4`]). Every entry is a
//! small state machine advanced by [`RmwController::advance_entry`], which
//! implements the `(request_type, state)` dispatch table described for this
//! controller.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::buffer::{EntryBuffer, EntryHandle};
use crate::common::{BlockAddr, Callback, Clock, LogicalAddr, Request, RequestKind, Response};
use crate::component::Component;
use crate::config::Section;
use crate::queue::RequestQueue;
use crate::static_media::StaticMedia;
use crate::stats::{Counter, Dumper};

/// The kind of access an RMW buffer entry currently represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RmwRequestType {
    WriteRmw,
    WriteComb,
    WritePatch,
    FlushBack,
    ReadCold,
    ReadFf,
}

/// The state of one RMW buffer entry's transition through the media.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RmwState {
    Init,
    PendingRead,
    PendingModify,
    PendingWrite,
    PendingReadout,
    PendingAitR,
    PendingAitW,
    End,
}

struct PendingRequest {
    kind: RmwRequestType,
    logical_addr: LogicalAddr,
}

/// A 256-byte RMW buffer entry.
pub struct RmwEntry {
    last_used_clk: Clock,
    next_action_clk: Clock,
    pending: bool,
    valid_to_read: bool,
    dirty: bool,
    waiting_action_clk_update: bool,
    cl_bitmap: u8,
    callbacks: [Option<Callback>; 4],
    cb_bitmap: u8,
    pending_request_cl_index: VecDeque<usize>,
    pending_request: Option<PendingRequest>,
    state: RmwState,
}

impl RmwEntry {
    fn new() -> Self {
        Self {
            last_used_clk: Clock(0),
            next_action_clk: Clock::INVALID,
            pending: false,
            valid_to_read: false,
            dirty: false,
            waiting_action_clk_update: false,
            cl_bitmap: 0,
            callbacks: [None, None, None, None],
            cb_bitmap: 0,
            pending_request_cl_index: VecDeque::new(),
            pending_request: None,
            state: RmwState::Init,
        }
    }

    /// Starts a fresh request lifecycle on this entry.
    ///
    /// # Panics
    ///
    /// Panics if the entry is already mid-request: double-assigning a
    /// pending entry is a structural invariant violation, not a recoverable
    /// back-pressure event.
    fn assign_new_request(&mut self, kind: RmwRequestType, logical_addr: LogicalAddr, bitmap: u8) {
        assert!(!self.pending, "assign_new_request on a still-pending RMW entry");
        self.pending_request = Some(PendingRequest { kind, logical_addr });
        self.cl_bitmap = bitmap;
        self.state = RmwState::Init;
        self.pending = true;
        self.waiting_action_clk_update = false;
        self.next_action_clk = Clock(0);
    }
}

struct LsqEntry {
    kind: RequestKind,
    addr: LogicalAddr,
    arrive: Clock,
    callback: Option<Callback>,
}

struct RoqEntry {
    addr: LogicalAddr,
    depart: Clock,
    callback: Option<Callback>,
}

/// The RMW controller, its local persistent media, and the AIT child it
/// forwards indirection traffic to.
pub struct Rmw {
    lsq: RequestQueue<LsqEntry>,
    roq: RequestQueue<RoqEntry>,
    buffer: EntryBuffer<BlockAddr, RmwEntry>,
    ait_to_rmw_latency: u64,
    rmw_to_ait_latency: u64,
    events: Counter,
    local: StaticMedia,
    next: Box<dyn Component>,
}

impl Rmw {
    /// Builds an RMW controller from its config section, owning `local`
    /// (the persistent media) and forwarding indirection traffic to `next`
    /// (the AIT controller).
    pub fn new(section: &Section, local: StaticMedia, next: Box<dyn Component>) -> Result<Self, crate::common::SimError> {
        Ok(Self {
            lsq: RequestQueue::new(section.get_usize("lsq_entries")?),
            roq: RequestQueue::new(section.get_usize("roq_entries")?),
            buffer: EntryBuffer::new(section.get_usize("buffer_entries")?),
            ait_to_rmw_latency: section.get_u64("ait_to_rmw_latency")?,
            rmw_to_ait_latency: section.get_u64("rmw_to_ait_latency")?,
            events: Counter::new(
                "rmw",
                "events",
                &[
                    "read_access",
                    "write_access",
                    "eviction",
                    "write_rmw",
                    "write_comb",
                    "write_patch",
                    "flush_back",
                    "read_patch",
                    "read_fast_forward",
                    "read_cold",
                    "patch_rmw",
                    "next_level_full",
                    "roq_full",
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
        let victim = self.buffer.least_recently_used(
            |e| e.state == RmwState::End,
            |e| e.last_used_clk.0,
        );
        match victim {
            Some(key) => {
                let _ = self.buffer.remove(key);
                self.events.incr("eviction");
                true
            }
            None => false,
        }
    }

    fn process_lsq_read(&mut self, clk: Clock) {
        let Some(front) = self.lsq.front() else { return };
        if front.kind != RequestKind::Read {
            return;
        }
        let addr = front.addr;
        let block = addr.rmw_block();
        let idx = addr.rmw_cl_index();

        if let Some(handle) = self.buffer.get(block) {
            let patchable = {
                let e = handle.borrow();
                matches!(
                    e.pending_request.as_ref().map(|p| p.kind),
                    Some(RmwRequestType::ReadCold) | Some(RmwRequestType::ReadFf)
                ) && e.pending_request_cl_index.len() < 4
                    && !e.pending_request_cl_index.contains(&idx)
            };
            if patchable {
                let Some(entry) = self.lsq.pop_front() else { return };
                let mut e = handle.borrow_mut();
                e.pending_request_cl_index.push_back(idx);
                e.callbacks[idx] = entry.callback;
                e.cb_bitmap |= 1 << idx;
                drop(e);
                self.events.incr("read_patch");
                return;
            }

            let can_fast_forward = {
                let e = handle.borrow();
                e.valid_to_read && !e.pending
            };
            if can_fast_forward {
                let Some(entry) = self.lsq.pop_front() else { return };
                let mut e = handle.borrow_mut();
                e.assign_new_request(RmwRequestType::ReadFf, block.into(), 1 << idx);
                e.pending_request_cl_index.push_back(idx);
                e.callbacks[idx] = entry.callback;
                e.cb_bitmap |= 1 << idx;
                e.last_used_clk = clk;
            }
            return;
        }

        if self.check_and_evict(clk) {
            let Some(entry) = self.lsq.pop_front() else { return };
            let Some(handle) = self.buffer.insert(block, RmwEntry::new()) else { return };
            let mut e = handle.borrow_mut();
            e.assign_new_request(RmwRequestType::ReadCold, LogicalAddr(block.val()), 1 << idx);
            e.pending_request_cl_index.push_back(idx);
            e.callbacks[idx] = entry.callback;
            e.cb_bitmap |= 1 << idx;
            e.last_used_clk = clk;
            self.events.incr("read_access");
        }
    }

    fn process_lsq_write(&mut self, clk: Clock) {
        let Some(front) = self.lsq.front() else { return };
        if front.kind != RequestKind::Write {
            return;
        }
        let block = front.addr.rmw_block();

        if let Some(handle) = self.buffer.get(block) {
            let mid_rmw = matches!(handle.borrow().state, RmwState::PendingRead | RmwState::PendingModify);
            if mid_rmw {
                let Some(entry) = self.lsq.pop_front() else { return };
                let idx = entry.addr.rmw_cl_index();
                let mut e = handle.borrow_mut();
                e.cl_bitmap |= 1 << idx;
                drop(e);
                self.events.incr("patch_rmw");
                self.events.incr("write_access");
                return;
            }
            // Entry exists but is busy in a non-patchable intermediate
            // state (e.g. mid write-comb or mid flush): stall rather than
            // assign a second request onto a still-pending entry.
            if handle.borrow().pending {
                return;
            }
        }

        let Some(head) = self.lsq.pop_front() else { return };
        let mut bitmap = 1u8 << head.addr.rmw_cl_index();
        let combined = self.lsq.drain_combinable(
            |item| item.kind == RequestKind::Write && item.addr.rmw_block() == block,
            |item| item.kind == RequestKind::Read && item.addr.rmw_block() == block,
        );
        for item in &combined {
            bitmap |= 1 << item.addr.rmw_cl_index();
        }

        let fresh = !self.buffer.contains(block);
        let req_type = if bitmap == 0xF {
            RmwRequestType::WriteComb
        } else if fresh {
            RmwRequestType::WriteRmw
        } else {
            RmwRequestType::WritePatch
        };

        let handle = match self.buffer.get(block) {
            Some(h) => h,
            None => {
                if !self.check_and_evict(clk) {
                    return;
                }
                let Some(h) = self.buffer.insert(block, RmwEntry::new()) else { return };
                h
            }
        };
        let mut e = handle.borrow_mut();
        e.assign_new_request(req_type, LogicalAddr(block.val()), bitmap);
        e.dirty = true;
        e.last_used_clk = clk;
        drop(e);

        self.events.incr("write_access");
        match req_type {
            RmwRequestType::WriteComb => self.events.incr("write_comb"),
            RmwRequestType::WriteRmw => self.events.incr("write_rmw"),
            RmwRequestType::WritePatch => self.events.incr("write_patch"),
            _ => {}
        }
    }

    fn drain_roq(&mut self, clk: Clock) {
        loop {
            match self.roq.front() {
                Some(front) if front.depart <= clk => {}
                _ => break,
            }
            let Some(entry) = self.roq.pop_front() else { break };
            if let Some(cb) = entry.callback {
                cb(entry.addr, clk);
            }
        }
    }

    fn issue_next_level(&mut self, kind: RequestKind, addr: LogicalAddr, clk: Clock, handle: &EntryHandle<RmwEntry>) -> bool {
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

    fn issue_local(&mut self, kind: RequestKind, addr: LogicalAddr, clk: Clock, handle: &EntryHandle<RmwEntry>) -> bool {
        let resp = self.local.issue_request(Request::new(kind, addr, clk));
        if !resp.accepted {
            self.events.incr("local_memory_issue_fail");
            return false;
        }
        let mut e = handle.borrow_mut();
        e.waiting_action_clk_update = false;
        e.next_action_clk = resp.next_clk + 1;
        true
    }

    fn wait_local(delay: u64, handle: &EntryHandle<RmwEntry>, clk: Clock) {
        let mut e = handle.borrow_mut();
        e.waiting_action_clk_update = false;
        e.next_action_clk = clk + delay;
    }

    fn send_to_roq(&mut self, handle: &EntryHandle<RmwEntry>, clk: Clock) {
        let idx = {
            let mut e = handle.borrow_mut();
            e.pending_request_cl_index.pop_front()
        };
        let Some(idx) = idx else { return };
        let mut e = handle.borrow_mut();
        let callback = e.callbacks[idx].take();
        e.cb_bitmap &= !(1 << idx);
        drop(e);
        if !self.roq.enqueue(RoqEntry { addr: LogicalAddr(0), depart: clk + 1, callback }) {
            self.events.incr("roq_full");
        }
    }

    fn advance_entry(&mut self, key: BlockAddr, handle: EntryHandle<RmwEntry>, clk: Clock) {
        let (waiting, pending, next_action_clk, state) = {
            let e = handle.borrow();
            (e.waiting_action_clk_update, e.pending, e.next_action_clk, e.state)
        };
        if state != RmwState::Init {
            if !pending || waiting {
                return;
            }
            if next_action_clk.is_valid() && next_action_clk > clk {
                return;
            }
        }

        let req_type = match handle.borrow().pending_request.as_ref() {
            Some(p) => p.kind,
            None => return,
        };
        let logical_addr = LogicalAddr(key.val());

        use RmwRequestType::*;
        use RmwState::*;
        match (req_type, state) {
            (WriteRmw, Init) => {
                if self.issue_next_level(RequestKind::Read, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingAitR;
                }
            }
            (WriteRmw, PendingAitR) => {
                Self::wait_local(self.ait_to_rmw_latency, &handle, clk);
                handle.borrow_mut().state = PendingRead;
            }
            (WriteRmw, PendingRead) => {
                if self.issue_local(RequestKind::Write, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingAitW;
                }
            }
            (WriteRmw, PendingAitW) => {
                Self::wait_local(self.rmw_to_ait_latency, &handle, clk);
                handle.borrow_mut().state = PendingModify;
            }
            (WriteRmw, PendingModify) => {
                if self.issue_next_level(RequestKind::Write, logical_addr, clk, &handle) {
                    let mut e = handle.borrow_mut();
                    e.state = PendingWrite;
                    e.valid_to_read = true;
                }
            }
            (WriteRmw, PendingWrite) | (WriteComb, PendingWrite) | (WritePatch, PendingWrite) => {
                let mut e = handle.borrow_mut();
                e.state = End;
                e.dirty = false;
                e.pending = false;
                e.pending_request = None;
                e.valid_to_read = true;
            }
            (WriteComb, Init) | (WritePatch, Init) => {
                if self.issue_local(RequestKind::Write, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingAitW;
                }
            }
            (WriteComb, PendingAitW) | (WritePatch, PendingAitW) => {
                Self::wait_local(self.rmw_to_ait_latency, &handle, clk);
                handle.borrow_mut().state = PendingModify;
            }
            (WriteComb, PendingModify) | (WritePatch, PendingModify) => {
                if self.issue_next_level(RequestKind::Write, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingWrite;
                }
            }
            (FlushBack, Init) => {
                if self.issue_next_level(RequestKind::Write, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingAitW;
                }
            }
            (FlushBack, PendingAitW) => {
                Self::wait_local(self.rmw_to_ait_latency, &handle, clk);
                handle.borrow_mut().state = PendingWrite;
            }
            (FlushBack, PendingWrite) => {
                let _ = self.buffer.remove(key);
                self.events.incr("flush_back");
            }
            (ReadCold, Init) => {
                if self.issue_next_level(RequestKind::Read, logical_addr, clk, &handle) {
                    self.events.incr("read_cold");
                    handle.borrow_mut().state = PendingAitR;
                }
            }
            (ReadCold, PendingAitR) => {
                Self::wait_local(self.ait_to_rmw_latency, &handle, clk);
                handle.borrow_mut().state = PendingRead;
            }
            (ReadCold, PendingRead) => {
                if self.issue_local(RequestKind::Read, logical_addr, clk, &handle) {
                    handle.borrow_mut().state = PendingReadout;
                }
            }
            (ReadCold, PendingReadout) => {
                self.send_to_roq(&handle, clk);
                let more = !handle.borrow().pending_request_cl_index.is_empty();
                let mut e = handle.borrow_mut();
                if more {
                    e.state = PendingRead;
                } else {
                    e.state = End;
                    e.pending = false;
                    e.pending_request = None;
                }
            }
            (ReadFf, Init) => {
                if self.issue_local(RequestKind::Read, logical_addr, clk, &handle) {
                    self.events.incr("read_fast_forward");
                    handle.borrow_mut().state = PendingReadout;
                }
            }
            (ReadFf, PendingReadout) => {
                self.send_to_roq(&handle, clk);
                let more = !handle.borrow().pending_request_cl_index.is_empty();
                let mut e = handle.borrow_mut();
                if more {
                    e.state = Init;
                } else {
                    e.state = End;
                    e.pending = false;
                    e.pending_request = None;
                }
            }
            _ => {}
        }
    }
}

impl Component for Rmw {
    fn issue_request(&mut self, req: Request) -> Response {
        let kind = req.kind;
        let addr = req.addr;
        let arrive = req.arrive;
        let callback = req.callback;
        let accepted = self.lsq.enqueue(LsqEntry { kind, addr, arrive, callback });
        Response {
            accepted,
            deterministic: false,
            next_clk: Clock::INVALID,
        }
    }

    fn tick_current(&mut self, clk: Clock) {
        self.drain_roq(clk);
        self.process_lsq_read(clk);
        self.process_lsq_write(clk);
        let keys: Vec<BlockAddr> = self.buffer.iter().map(|(k, _)| k).collect();
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
        self.lsq.pending()
            || self.roq.pending()
            || self.buffer.any(|e| e.pending)
            || self.next.pending()
    }

    fn drain_current(&mut self) {
        let keys: Vec<BlockAddr> = self.buffer.iter().map(|(k, _)| k).collect();
        for key in keys {
            if let Some(handle) = self.buffer.get(key) {
                let mut e = handle.borrow_mut();
                if e.state == RmwState::End && e.dirty {
                    e.pending_request = Some(PendingRequest {
                        kind: RmwRequestType::FlushBack,
                        logical_addr: LogicalAddr(key.val()),
                    });
                    e.state = RmwState::Init;
                    e.pending = true;
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

impl From<BlockAddr> for LogicalAddr {
    fn from(b: BlockAddr) -> Self {
        LogicalAddr(b.val())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::config::RootConfig;

    fn rmw_section(extra: &str) -> Section {
        let text = format!(
            "[rmw]\n\
             lsq_entries: 8\n\
             roq_entries: 8\n\
             buffer_entries: 4\n\
             ait_to_rmw_latency: 2\n\
             rmw_to_ait_latency: 2\n\
             {extra}\n"
        );
        RootConfig::parse(&text).unwrap().section("rmw").unwrap().clone()
    }

    fn build(section: &Section, local_latency: u64, next_latency: u64) -> Rmw {
        Rmw::new(
            section,
            StaticMedia::new(local_latency, local_latency),
            Box::new(StaticMedia::new(next_latency, next_latency)),
        )
        .unwrap()
    }

    fn run_to_quiescence(rmw: &mut Rmw, max_ticks: u64) {
        for t in 0..max_ticks {
            if !rmw.pending() {
                return;
            }
            rmw.tick_current(Clock(t));
        }
        panic!("rmw did not quiesce within {max_ticks} ticks");
    }

    fn read_with_flag(addr: u64) -> (Request, Rc<Cell<bool>>) {
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        let req = Request::new(RequestKind::Read, LogicalAddr(addr), Clock(0))
            .with_callback(Box::new(move |_addr, _clk| flag.set(true)));
        (req, done)
    }

    #[test]
    fn cold_read_completes_and_counts_once() {
        let section = rmw_section("");
        let mut rmw = build(&section, 3, 5);
        let (req, done) = read_with_flag(0);

        assert!(rmw.issue_request(req).accepted);
        run_to_quiescence(&mut rmw, 100);

        assert!(done.get(), "cold read never completed");
        assert_eq!(rmw.events.get("read_access"), 1);
        assert_eq!(rmw.events.get("read_cold"), 1);
    }

    #[test]
    fn four_sequential_writes_to_one_block_combine_into_a_single_event() {
        let section = rmw_section("");
        let mut rmw = build(&section, 1, 1);

        for addr in [0u64, 0x40, 0x80, 0xC0] {
            let req = Request::new(RequestKind::Write, LogicalAddr(addr), Clock(0));
            assert!(rmw.issue_request(req).accepted);
        }
        rmw.tick_current(Clock(0));

        assert_eq!(rmw.events.get("write_access"), 1);
        assert_eq!(rmw.events.get("write_comb"), 1);
        assert_eq!(rmw.events.get("write_rmw"), 0);
        let handle = rmw.buffer.get(BlockAddr(0)).expect("block should be buffered");
        assert_eq!(handle.borrow().cl_bitmap, 0xF);
    }

    #[test]
    fn a_write_arriving_mid_rmw_patches_instead_of_starting_a_new_cycle() {
        // ait_to_rmw_latency of 0 gets the entry into `PendingRead` (the
        // patchable window) the tick right after the next-level read is
        // issued, so the second write's arrival can be timed precisely.
        let section = rmw_section("ait_to_rmw_latency: 0\nrmw_to_ait_latency: 0\n");
        let mut rmw = build(&section, 1, 2);

        let first = Request::new(RequestKind::Write, LogicalAddr(0), Clock(0));
        assert!(rmw.issue_request(first).accepted);
        for t in 0..4 {
            rmw.tick_current(Clock(t));
        }
        {
            let handle = rmw.buffer.get(BlockAddr(0)).expect("block should be buffered");
            assert_eq!(handle.borrow().state, RmwState::PendingRead);
        }

        let second = Request::new(RequestKind::Write, LogicalAddr(0x40), Clock(4));
        assert!(rmw.issue_request(second).accepted);
        rmw.tick_current(Clock(4));

        assert_eq!(rmw.events.get("patch_rmw"), 1);
        assert_eq!(rmw.events.get("write_rmw"), 1);
        assert_eq!(rmw.events.get("write_access"), 2);
    }

    #[test]
    fn a_third_distinct_block_evicts_the_least_recently_used_clean_entry() {
        let section = rmw_section("buffer_entries: 1\n");
        let mut rmw = build(&section, 1, 1);

        let (req_a, done_a) = read_with_flag(0);
        assert!(rmw.issue_request(req_a).accepted);
        run_to_quiescence(&mut rmw, 100);
        assert!(done_a.get());

        let (req_b, done_b) = read_with_flag(0x100);
        assert!(rmw.issue_request(req_b).accepted);
        run_to_quiescence(&mut rmw, 100);
        assert!(done_b.get());

        assert_eq!(rmw.events.get("eviction"), 1);
        assert_eq!(rmw.events.get("read_access"), 2);
    }
}
