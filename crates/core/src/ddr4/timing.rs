//! DDR4 command/level vocabulary, the timing table, and prerequisite
//! substitution.
//!
//! The hierarchy modeled here is `{channel, rank, bank_group, bank}`; row and
//! column are tracked as *state* on a bank (an open-row id, and the implicit
//! fact that a column access can always be decoded once its bank is open)
//! rather than as separate tree levels — real DDR4 electrical constraints
//! (tRCD, tRAS, tRP, tCCD, tRRD, tFAW, tREFI) all gate at bank, bank-group,
//! or rank granularity, so a node per row or per column would track state
//! nothing in this model ever reads.

use std::collections::HashMap;

use crate::common::SimError;
use crate::config::Section;

/// A level in the DRAM hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Channel,
    Rank,
    BankGroup,
    Bank,
}

impl Level {
    /// All levels, outermost first.
    pub const ALL: [Level; 4] = [Level::Channel, Level::Rank, Level::BankGroup, Level::Bank];
}

/// A DDR4 command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Act,
    Pre,
    Prea,
    Rd,
    Wr,
    Rda,
    Wra,
    Ref,
    Pde,
    Pdx,
    Sre,
    Srx,
}

impl Command {
    /// All commands.
    pub const ALL: [Command; 12] = [
        Command::Act,
        Command::Pre,
        Command::Prea,
        Command::Rd,
        Command::Wr,
        Command::Rda,
        Command::Wra,
        Command::Ref,
        Command::Pde,
        Command::Pdx,
        Command::Sre,
        Command::Srx,
    ];

    /// The level at which this command is decoded and whose state it reads.
    pub fn scope(self) -> Level {
        match self {
            Command::Act | Command::Pre | Command::Rd | Command::Wr | Command::Rda | Command::Wra => {
                Level::Bank
            }
            Command::Prea | Command::Ref | Command::Pde | Command::Pdx | Command::Sre | Command::Srx => {
                Level::Rank
            }
        }
    }

    /// Whether this command opens a row (moves a bank from closed to opened).
    pub fn is_opening(self) -> bool {
        matches!(self, Command::Act)
    }

    /// Whether this command closes a row.
    pub fn is_closing(self) -> bool {
        matches!(self, Command::Pre | Command::Prea | Command::Rda | Command::Wra)
    }

    /// Whether this command performs a column access (reads or writes data).
    pub fn is_accessing(self) -> bool {
        matches!(self, Command::Rd | Command::Wr | Command::Rda | Command::Wra)
    }

    /// Whether this command is a refresh.
    pub fn is_refreshing(self) -> bool {
        matches!(self, Command::Ref)
    }
}

/// The open/closed/power state of a bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankState {
    Closed,
    Opened,
    PowerDown,
    SelfRefresh,
}

/// One consequent-timing entry: issuing a command updates `next[consequent]`
/// at `level`'s node using the `distance`-th most recent issuance of the
/// *issuing* command at that same level.
///
/// `has_sibling` distinguishes two shapes of constraint: most entries gate
/// every node *under* `level` (a rank-level entry is checked by every bank
/// group and bank in that rank, via the level-truncated path lookup). A
/// `has_sibling` entry instead gates every *other* node at `level` itself —
/// rank-to-rank CAS switching delays the next CAS issued to any rank but the
/// one that just issued, not the issuing rank's own descendants.
#[derive(Clone, Copy, Debug)]
pub struct TimingEntry {
    pub consequent: Command,
    pub delay: u64,
    pub level: Level,
    pub distance: usize,
    pub has_sibling: bool,
}

/// The full set of DDR4 timing parameters, as read from a `[ddr4]`-style
/// config section.
///
/// All fields are parsed and retained even though only a subset feeds the
/// timing table below: a real DDR4 config supplies every one of these keys,
/// and dropping the unused ones would make round-tripping a config file
/// silently lossy.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ddr4Timing {
    pub rate: u64,
    pub freq: f64,
    pub tck: f64,
    pub nbl: u64,
    pub nccds: u64,
    pub nccdl: u64,
    pub nrtrs: u64,
    pub ncl: u64,
    pub nrcd: u64,
    pub nrp: u64,
    pub ncwl: u64,
    pub nras: u64,
    pub nrc: u64,
    pub nrtp: u64,
    pub nwtrs: u64,
    pub nwtrl: u64,
    pub nwr: u64,
    pub nrrds: u64,
    pub nrrdl: u64,
    pub nfaw: u64,
    pub nrfc: u64,
    pub nrefi: u64,
    pub npd: u64,
    pub nxp: u64,
    pub nxpdll: u64,
    pub nckesr: u64,
    pub nxs: u64,
    pub nxsdll: u64,
}

impl Ddr4Timing {
    /// Parses all timing fields from a config section.
    pub fn from_section(section: &Section) -> Result<Self, SimError> {
        Ok(Self {
            rate: section.get_u64("rate")?,
            freq: section.get_f64("freq")?,
            tck: section.get_f64("tCK")?,
            nbl: section.get_u64("nBL")?,
            nccds: section.get_u64("nCCDS")?,
            nccdl: section.get_u64("nCCDL")?,
            nrtrs: section.get_u64("nRTRS")?,
            ncl: section.get_u64("nCL")?,
            nrcd: section.get_u64("nRCD")?,
            nrp: section.get_u64("nRP")?,
            ncwl: section.get_u64("nCWL")?,
            nras: section.get_u64("nRAS")?,
            nrc: section.get_u64("nRC")?,
            nrtp: section.get_u64("nRTP")?,
            nwtrs: section.get_u64("nWTRS")?,
            nwtrl: section.get_u64("nWTRL")?,
            nwr: section.get_u64("nWR")?,
            nrrds: section.get_u64("nRRDS")?,
            nrrdl: section.get_u64("nRRDL")?,
            nfaw: section.get_u64("nFAW")?,
            nrfc: section.get_u64("nRFC")?,
            nrefi: section.get_u64("nREFI")?,
            npd: section.get_u64_or("nPD", 0)?,
            nxp: section.get_u64_or("nXP", 0)?,
            nxpdll: section.get_u64_or("nXPDLL", 0)?,
            nckesr: section.get_u64_or("nCKESR", 0)?,
            nxs: section.get_u64_or("nXS", 0)?,
            nxsdll: section.get_u64_or("nXSDLL", 0)?,
        })
    }
}

/// Builds the timing table: for each issuable command, the list of
/// consequent constraints it establishes.
pub fn build_timing_table(t: &Ddr4Timing) -> HashMap<Command, Vec<TimingEntry>> {
    let mut table: HashMap<Command, Vec<TimingEntry>> = HashMap::new();

    let _ = table.insert(
        Command::Act,
        vec![
            // tRRD_S: activate-to-activate, different bank group.
            TimingEntry { consequent: Command::Act, delay: t.nrrds, level: Level::Rank, distance: 1, has_sibling: false },
            // tRRD_L: activate-to-activate, same bank group.
            TimingEntry { consequent: Command::Act, delay: t.nrrdl, level: Level::BankGroup, distance: 1, has_sibling: false },
            // tFAW: four-activate window, rank-wide.
            TimingEntry { consequent: Command::Act, delay: t.nfaw, level: Level::Rank, distance: 4, has_sibling: false },
            // tRAS: minimum time before this bank may precharge.
            TimingEntry { consequent: Command::Pre, delay: t.nras, level: Level::Bank, distance: 1, has_sibling: false },
            TimingEntry { consequent: Command::Prea, delay: t.nras, level: Level::Rank, distance: 1, has_sibling: false },
            // tRCD: row-to-column delay.
            TimingEntry { consequent: Command::Rd, delay: t.nrcd, level: Level::Bank, distance: 1, has_sibling: false },
            TimingEntry { consequent: Command::Wr, delay: t.nrcd, level: Level::Bank, distance: 1, has_sibling: false },
            TimingEntry { consequent: Command::Rda, delay: t.nrcd, level: Level::Bank, distance: 1, has_sibling: false },
            TimingEntry { consequent: Command::Wra, delay: t.nrcd, level: Level::Bank, distance: 1, has_sibling: false },
            // tRC: activate-to-activate, same bank.
            TimingEntry { consequent: Command::Act, delay: t.nrc, level: Level::Bank, distance: 1, has_sibling: false },
        ],
    );

    let _ = table.insert(
        Command::Pre,
        vec![TimingEntry { consequent: Command::Act, delay: t.nrp, level: Level::Bank, distance: 1, has_sibling: false }],
    );
    let _ = table.insert(
        Command::Prea,
        vec![TimingEntry { consequent: Command::Act, delay: t.nrp, level: Level::Rank, distance: 1, has_sibling: false }],
    );

    let _ = table.insert(
        Command::Rd,
        vec![
            TimingEntry { consequent: Command::Rd, delay: t.nccds, level: Level::BankGroup, distance: 1, has_sibling: false },
            TimingEntry { consequent: Command::Rd, delay: t.nccdl, level: Level::Bank, distance: 1, has_sibling: false },
            TimingEntry { consequent: Command::Wr, delay: t.nwtrs, level: Level::Rank, distance: 1, has_sibling: false },
            TimingEntry { consequent: Command::Pre, delay: t.nrtp, level: Level::Bank, distance: 1, has_sibling: false },
            // tRTRS: rank-to-rank CAS switching, gates the next read on every
            // other rank sharing this channel rather than this rank itself.
            TimingEntry { consequent: Command::Rd, delay: t.nrtrs, level: Level::Rank, distance: 1, has_sibling: true },
        ],
    );
    let _ = table.insert(
        Command::Rda,
        vec![TimingEntry { consequent: Command::Act, delay: t.nrtp + t.nrp, level: Level::Bank, distance: 1, has_sibling: false }],
    );

    let _ = table.insert(
        Command::Wr,
        vec![
            TimingEntry { consequent: Command::Wr, delay: t.nccds, level: Level::BankGroup, distance: 1, has_sibling: false },
            TimingEntry { consequent: Command::Wr, delay: t.nccdl, level: Level::Bank, distance: 1, has_sibling: false },
            TimingEntry { consequent: Command::Rd, delay: t.nwtrl, level: Level::Rank, distance: 1, has_sibling: false },
            TimingEntry { consequent: Command::Pre, delay: t.nwr, level: Level::Bank, distance: 1, has_sibling: false },
            // tRTRS: rank-to-rank CAS switching, gates the next write on
            // every other rank sharing this channel rather than this rank.
            TimingEntry { consequent: Command::Wr, delay: t.nrtrs, level: Level::Rank, distance: 1, has_sibling: true },
        ],
    );
    let _ = table.insert(
        Command::Wra,
        vec![TimingEntry { consequent: Command::Act, delay: t.nwr + t.nrp, level: Level::Bank, distance: 1, has_sibling: false }],
    );

    let _ = table.insert(
        Command::Ref,
        vec![TimingEntry { consequent: Command::Act, delay: t.nrfc, level: Level::Rank, distance: 1, has_sibling: false }],
    );

    let _ = table.insert(
        Command::Pde,
        vec![TimingEntry { consequent: Command::Pdx, delay: t.npd, level: Level::Rank, distance: 1, has_sibling: false }],
    );
    let _ = table.insert(
        Command::Pdx,
        vec![TimingEntry { consequent: Command::Act, delay: t.nxp, level: Level::Rank, distance: 1, has_sibling: false }],
    );
    let _ = table.insert(
        Command::Sre,
        vec![TimingEntry { consequent: Command::Srx, delay: t.nckesr, level: Level::Rank, distance: 1, has_sibling: false }],
    );
    let _ = table.insert(
        Command::Srx,
        vec![TimingEntry { consequent: Command::Act, delay: t.nxs, level: Level::Rank, distance: 1, has_sibling: false }],
    );

    table
}

/// Given the current bank state, returns a prerequisite command that must be
/// issued before `cmd`, if any.
///
/// Mirrors the upstream `prereq_table`: for example a column access against
/// a closed bank must first `ACT`, and an access against an opened bank with
/// a different row open must first `PRE`.
pub fn prerequisite(cmd: Command, state: BankState, open_row: Option<u64>, target_row: u64) -> Option<Command> {
    match cmd {
        Command::Rd | Command::Wr | Command::Rda | Command::Wra => match state {
            BankState::Closed => Some(Command::Act),
            BankState::Opened if open_row != Some(target_row) => Some(Command::Pre),
            BankState::Opened => None,
            BankState::PowerDown => Some(Command::Pdx),
            BankState::SelfRefresh => Some(Command::Srx),
        },
        Command::Act => match state {
            BankState::Opened if open_row != Some(target_row) => Some(Command::Pre),
            BankState::PowerDown => Some(Command::Pdx),
            BankState::SelfRefresh => Some(Command::Srx),
            _ => None,
        },
        _ => None,
    }
}

/// Applies the state transition of issuing `cmd` against a bank's state.
pub fn apply_state_transition(cmd: Command, state: &mut BankState, open_row: &mut Option<u64>, row: u64) {
    match cmd {
        Command::Act => {
            *state = BankState::Opened;
            *open_row = Some(row);
        }
        Command::Pre | Command::Prea | Command::Rda | Command::Wra => {
            *state = BankState::Closed;
            *open_row = None;
        }
        Command::Pde => *state = BankState::PowerDown,
        Command::Pdx => *state = BankState::Closed,
        Command::Sre => *state = BankState::SelfRefresh,
        Command::Srx => *state = BankState::Closed,
        _ => {}
    }
}
