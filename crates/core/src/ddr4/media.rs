//! The DDR4 scheduler: per-bank state, the timing table, four issue queues,
//! and the FR-FCFS-ish arbitration loop.

use std::collections::{HashMap, VecDeque};

use crate::common::{Callback, Clock, LogicalAddr, Request, RequestKind, Response, SimError};
use crate::component::Component;
use crate::config::Section;
use crate::ddr4::timing::{
    apply_state_transition, build_timing_table, prerequisite, BankState, Command, Ddr4Timing, Level,
    TimingEntry,
};
use crate::stats::{Counter, Dumper};

/// Per-level geometry (instance counts) of the DRAM hierarchy.
#[derive(Clone, Copy, Debug)]
pub struct Geometry {
    pub channel: usize,
    pub rank: usize,
    pub bank_group: usize,
    pub bank: usize,
    pub row: usize,
    pub col: usize,
}

impl Geometry {
    /// Parses geometry from a `[ddr4]`-style config section.
    pub fn from_section(section: &Section) -> Result<Self, SimError> {
        Ok(Self {
            channel: section.get_usize("channel")?,
            rank: section.get_usize("rank")?,
            bank_group: section.get_usize("bank_group")?,
            bank: section.get_usize("bank")?,
            row: section.get_usize("row")?,
            col: section.get_usize("col")?,
        })
    }
}

/// A decoded DRAM address: one index per hierarchy level, plus the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DramAddr {
    pub channel: usize,
    pub rank: usize,
    pub bank_group: usize,
    pub bank: usize,
    pub row: u64,
}

fn ceil_log2(count: usize) -> u32 {
    if count <= 1 {
        0
    } else {
        (usize::BITS - (count - 1).leading_zeros()).max(1)
    }
}

/// Decodes a logical address into a [`DramAddr`] using a 12-character
/// permutation string (six two-letter level tags, MSB-level first) such as
/// `"ChRaBgBaRoCo"`.
pub fn decode_address(addr: u64, geometry: &Geometry, order: &str) -> Result<DramAddr, SimError> {
    if order.len() != 12 {
        return Err(SimError::ConfigValueType {
            key: "media_mapping_func".to_string(),
            value: order.to_string(),
            expected: "a 12-character level permutation",
        });
    }
    let tokens: Vec<&str> = (0..6).map(|i| &order[i * 2..i * 2 + 2]).collect();
    let width_of = |tok: &str| -> u32 {
        match tok {
            "Ch" => ceil_log2(geometry.channel),
            "Ra" => ceil_log2(geometry.rank),
            "Bg" => ceil_log2(geometry.bank_group),
            "Ba" => ceil_log2(geometry.bank),
            "Ro" => ceil_log2(geometry.row),
            "Co" => ceil_log2(geometry.col),
            _ => 0,
        }
    };

    let bits = addr >> 6; // strip the 64-byte cache-line offset
    let mut values: HashMap<&str, u64> = HashMap::new();
    let mut shift = 0u32;
    for tok in tokens.iter().rev() {
        let width = width_of(tok);
        let mask = if width == 0 { 0 } else { (1u64 << width) - 1 };
        let _ = values.insert(tok, (bits >> shift) & mask);
        shift += width;
    }

    Ok(DramAddr {
        channel: *values.get("Ch").unwrap_or(&0) as usize,
        rank: *values.get("Ra").unwrap_or(&0) as usize,
        bank_group: *values.get("Bg").unwrap_or(&0) as usize,
        bank: *values.get("Ba").unwrap_or(&0) as usize,
        row: *values.get("Ro").unwrap_or(&0),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct BankKey(usize, usize, usize, usize);

struct BankEntry {
    state: BankState,
    open_row: Option<u64>,
}

struct RingBuffer {
    buf: VecDeque<Clock>,
    cap: usize,
}

impl RingBuffer {
    fn new(cap: usize) -> Self {
        Self { buf: VecDeque::with_capacity(cap), cap: cap.max(1) }
    }

    fn push(&mut self, clk: Clock) {
        if self.buf.len() == self.cap {
            let _ = self.buf.pop_back();
        }
        self.buf.push_front(clk);
    }

    /// Returns the `distance`-th most recent entry (1 = most recent).
    fn nth_most_recent(&self, distance: usize) -> Option<Clock> {
        self.buf.get(distance - 1).copied()
    }
}

/// A request awaiting service inside one of the four issue queues.
struct PendingAccess {
    kind: RequestKind,
    addr: LogicalAddr,
    dram: DramAddr,
    arrive: Clock,
    callback: Option<Callback>,
}

/// A served read awaiting its deterministic departure clock.
struct DepartingRead {
    addr: LogicalAddr,
    depart: Clock,
    callback: Option<Callback>,
}

/// The DDR4 command-level media model.
pub struct Ddr4Media {
    geometry: Geometry,
    media_mapping_func: String,
    timing_table: HashMap<Command, Vec<TimingEntry>>,
    nrefi: u64,
    read_latency: u64,

    banks: HashMap<BankKey, BankEntry>,
    next: HashMap<(Level, Vec<usize>, Command), Clock>,
    prev: HashMap<(Level, Vec<usize>, Command), RingBuffer>,
    max_distance: HashMap<(Level, Command), usize>,

    act_q: VecDeque<PendingAccess>,
    misc_q: VecDeque<PendingAccess>,
    read_q: VecDeque<PendingAccess>,
    write_q: VecDeque<PendingAccess>,
    pending_queue: VecDeque<DepartingRead>,

    write_priority: bool,
    last_refreshed_clk: Clock,
    queue_capacity: usize,

    events: Counter,
}

impl Ddr4Media {
    /// Builds a DDR4 media model from its config section.
    pub fn new(section: &Section, geometry: Geometry) -> Result<Self, SimError> {
        let timing = Ddr4Timing::from_section(section)?;
        let timing_table = build_timing_table(&timing);
        let media_mapping_func = section.get_string_or("media_mapping_func", "ChRaBgBaRoCo");
        let queue_capacity = section.get_usize("queue_entries").unwrap_or(16);
        let read_latency = timing.ncl + timing.nbl;

        let mut max_distance: HashMap<(Level, Command), usize> = HashMap::new();
        for (&cmd, entries) in &timing_table {
            for entry in entries {
                let slot = max_distance.entry((entry.level, cmd)).or_insert(1);
                *slot = (*slot).max(entry.distance);
            }
        }

        Ok(Self {
            geometry,
            media_mapping_func,
            timing_table,
            nrefi: timing.nrefi,
            read_latency,
            banks: HashMap::new(),
            next: HashMap::new(),
            prev: HashMap::new(),
            max_distance,
            act_q: VecDeque::new(),
            misc_q: VecDeque::new(),
            read_q: VecDeque::new(),
            write_q: VecDeque::new(),
            pending_queue: VecDeque::new(),
            write_priority: false,
            last_refreshed_clk: Clock(0),
            queue_capacity,
            events: Counter::new(
                "ddr4",
                "events",
                &["read_access", "write_access", "refresh", "queue_full"],
            ),
        })
    }

    fn path_for(&self, level: Level, dram: &DramAddr) -> Vec<usize> {
        match level {
            Level::Channel => vec![dram.channel],
            Level::Rank => vec![dram.channel, dram.rank],
            Level::BankGroup => vec![dram.channel, dram.rank, dram.bank_group],
            Level::Bank => vec![dram.channel, dram.rank, dram.bank_group, dram.bank],
        }
    }

    /// Every other node's path at `level` under the same parent as `dram`,
    /// excluding `dram`'s own index at that level.
    fn sibling_paths(&self, level: Level, dram: &DramAddr) -> Vec<Vec<usize>> {
        let own = self.path_for(level, dram);
        let count = match level {
            Level::Channel => self.geometry.channel,
            Level::Rank => self.geometry.rank,
            Level::BankGroup => self.geometry.bank_group,
            Level::Bank => self.geometry.bank,
        };
        let own_index = *own.last().expect("path always has at least one component");
        (0..count)
            .filter(|&i| i != own_index)
            .map(|i| {
                let mut sibling = own.clone();
                *sibling.last_mut().unwrap() = i;
                sibling
            })
            .collect()
    }

    fn bank_key(dram: &DramAddr) -> BankKey {
        BankKey(dram.channel, dram.rank, dram.bank_group, dram.bank)
    }

    fn bank_state(&self, dram: &DramAddr) -> (BankState, Option<u64>) {
        match self.banks.get(&Self::bank_key(dram)) {
            Some(entry) => (entry.state, entry.open_row),
            None => (BankState::Closed, None),
        }
    }

    /// Returns whether `cmd` can be issued at `dram` right now, checking the
    /// constraint recorded at every level from `Channel` down to `cmd`'s
    /// scope.
    fn check(&self, cmd: Command, dram: &DramAddr, clk: Clock) -> bool {
        for level in Level::ALL {
            let path = self.path_for(level, dram);
            if let Some(&gate) = self.next.get(&(level, path, cmd)) {
                if clk < gate {
                    return false;
                }
            }
            if level == cmd.scope() {
                break;
            }
        }
        true
    }

    /// Records the effects of issuing `cmd` at `dram` and clock `clk`:
    /// updates this command's own history rings and every consequent
    /// command's `next[]` gate.
    fn update_timing(&mut self, cmd: Command, dram: &DramAddr, clk: Clock) {
        let entries = match self.timing_table.get(&cmd) {
            Some(e) => e.clone(),
            None => return,
        };

        let mut touched_levels: Vec<Level> = entries.iter().map(|e| e.level).collect();
        touched_levels.sort();
        touched_levels.dedup();
        for level in touched_levels {
            let cap = *self.max_distance.get(&(level, cmd)).unwrap_or(&1);
            let path = self.path_for(level, dram);
            self.prev
                .entry((level, path, cmd))
                .or_insert_with(|| RingBuffer::new(cap))
                .push(clk);
        }

        for entry in &entries {
            let path = self.path_for(entry.level, dram);
            let ring = self.prev.get(&(entry.level, path.clone(), cmd));
            let Some(past_clk) = ring.and_then(|r| r.nth_most_recent(entry.distance)) else {
                continue;
            };
            let gate = past_clk + entry.delay;
            let targets = if entry.has_sibling { self.sibling_paths(entry.level, dram) } else { vec![path] };
            for target in targets {
                let slot = self.next.entry((entry.level, target, entry.consequent)).or_insert(Clock(0));
                if gate > *slot {
                    *slot = gate;
                }
            }
        }
    }

    fn apply_state(&mut self, cmd: Command, dram: &DramAddr) {
        let key = Self::bank_key(dram);
        let bank = self.banks.entry(key).or_insert(BankEntry { state: BankState::Closed, open_row: None });
        apply_state_transition(cmd, &mut bank.state, &mut bank.open_row, dram.row);
    }

    fn decode_addr(&self, addr: LogicalAddr) -> Result<DramAddr, SimError> {
        decode_address(addr.val(), &self.geometry, &self.media_mapping_func)
    }

    fn enqueue_refresh_if_due(&mut self, clk: Clock) {
        if clk.0.saturating_sub(self.last_refreshed_clk.0) >= self.nrefi {
            self.last_refreshed_clk = clk;
            self.events.incr("refresh");
            for channel in 0..self.geometry.channel.max(1) {
                for rank in 0..self.geometry.rank.max(1) {
                    self.misc_q.push_back(PendingAccess {
                        kind: RequestKind::Write,
                        addr: LogicalAddr(0),
                        dram: DramAddr { channel, rank, bank_group: 0, bank: 0, row: 0 },
                        arrive: clk,
                        callback: None,
                    });
                }
            }
        }
    }

    fn select_queue(&mut self) -> Option<&mut VecDeque<PendingAccess>> {
        if !self.act_q.is_empty() {
            return Some(&mut self.act_q);
        }
        if !self.misc_q.is_empty() {
            return Some(&mut self.misc_q);
        }
        if self.read_q.is_empty() && self.write_q.is_empty() {
            return None;
        }
        let prefer_write = match (self.read_q.front(), self.write_q.front()) {
            (Some(r), Some(w)) => w.arrive <= r.arrive || self.write_priority,
            (None, Some(_)) => true,
            _ => false,
        };
        self.write_priority = prefer_write && !self.write_q.is_empty();
        if prefer_write {
            Some(&mut self.write_q)
        } else {
            Some(&mut self.read_q)
        }
    }

    fn target_command(kind: RequestKind) -> Command {
        match kind {
            RequestKind::Read => Command::Rd,
            RequestKind::Write => Command::Wr,
        }
    }

    fn service_head(&mut self, clk: Clock) {
        let from_act = !self.act_q.is_empty();
        let from_misc = !from_act && !self.misc_q.is_empty();

        let (kind, dram) = {
            let queue = match self.select_queue() {
                Some(q) => q,
                None => return,
            };
            match queue.front() {
                Some(a) => (a.kind, a.dram),
                None => return,
            }
        };

        let target = Self::target_command(kind);
        let (state, open_row) = self.bank_state(&dram);
        let next_cmd = if from_misc {
            Command::Ref
        } else {
            prerequisite(target, state, open_row, dram.row).unwrap_or(target)
        };

        if !self.check(next_cmd, &dram, clk) {
            return;
        }

        self.apply_state(next_cmd, &dram);
        self.update_timing(next_cmd, &dram, clk);

        if next_cmd == Command::Ref {
            let _ = self.misc_q.pop_front();
            return;
        }

        if next_cmd != target {
            if next_cmd.is_opening() && !from_act {
                let moved = if kind == RequestKind::Read {
                    self.read_q.pop_front()
                } else {
                    self.write_q.pop_front()
                };
                if let Some(entry) = moved {
                    self.act_q.push_back(entry);
                }
            }
            return;
        }

        let access = if from_act {
            self.act_q.pop_front()
        } else if kind == RequestKind::Read {
            self.read_q.pop_front()
        } else {
            self.write_q.pop_front()
        };
        let Some(access) = access else { return };

        match access.kind {
            RequestKind::Read => {
                self.events.incr("read_access");
                self.pending_queue.push_back(DepartingRead {
                    addr: access.addr,
                    depart: clk + self.read_latency,
                    callback: access.callback,
                });
            }
            RequestKind::Write => {
                self.events.incr("write_access");
                if let Some(cb) = access.callback {
                    cb(access.addr, clk);
                }
            }
        }
    }

    fn drain_pending_queue(&mut self, clk: Clock) {
        loop {
            match self.pending_queue.front() {
                Some(front) if front.depart <= clk => {}
                _ => break,
            }
            let Some(departing) = self.pending_queue.pop_front() else { break };
            if let Some(cb) = departing.callback {
                cb(departing.addr, departing.depart);
            }
        }
    }

    fn fast_forward_write_to_read(&mut self, req: &Request) -> bool {
        if req.kind != RequestKind::Read {
            return false;
        }
        self.write_q.iter().any(|w| w.addr == req.addr)
    }
}

impl Component for Ddr4Media {
    fn issue_request(&mut self, req: Request) -> Response {
        if self.act_q.len() + self.misc_q.len() + self.read_q.len() + self.write_q.len() >= self.queue_capacity * 4 {
            self.events.incr("queue_full");
            return Response::REJECTED;
        }
        let dram = match self.decode_addr(req.addr) {
            Ok(d) => d,
            Err(_) => return Response::REJECTED,
        };

        if self.fast_forward_write_to_read(&req) {
            self.events.incr("read_access");
            self.pending_queue.push_back(DepartingRead {
                addr: req.addr,
                depart: req.arrive + 1,
                callback: req.callback,
            });
            return Response::accepted_estimate(Clock::INVALID);
        }

        let access = PendingAccess {
            kind: req.kind,
            addr: req.addr,
            dram,
            arrive: req.arrive,
            callback: req.callback,
        };
        match req.kind {
            RequestKind::Read => self.read_q.push_back(access),
            RequestKind::Write => self.write_q.push_back(access),
        }
        Response::accepted_estimate(Clock::INVALID)
    }

    fn tick_current(&mut self, clk: Clock) {
        self.drain_pending_queue(clk);
        self.enqueue_refresh_if_due(clk);
        self.service_head(clk);
    }

    fn full(&self) -> bool {
        self.act_q.len() + self.misc_q.len() + self.read_q.len() + self.write_q.len() >= self.queue_capacity * 4
    }

    fn pending(&self) -> bool {
        !(self.act_q.is_empty()
            && self.misc_q.is_empty()
            && self.read_q.is_empty()
            && self.write_q.is_empty()
            && self.pending_queue.is_empty())
    }

    fn print_counters(&self, dumper: &mut Dumper) {
        dumper.record(&self.events);
    }
}
