use std::sync::Once;

use nvsim_core::config::RootConfig;
use nvsim_core::factory;
use nvsim_core::stats::{DumpType, Dumper};
use nvsim_core::trace::parse;
use nvsim_core::Simulator;

static TRACING_INIT: Once = Once::new();

/// The organization used by every harness-built tree: one channel straight
/// down the stack (`imc -> rmw -> ait -> ddr4`), small enough that tests can
/// force backpressure and eviction without a long trace.
const DEFAULT_CONFIG: &str = "\
[organization]
root: 1*imc
imc: 1*rmw
rmw: 1*ait
ait: 1*ddr4

[rmc]
start_addr: 0
component_mapping_func: none_mapping

[imc]
wpq_entries: 4
rpq_entries: 4
adr_epoch: 0

[rmw]
lsq_entries: 2
roq_entries: 4
buffer_entries: 2
ait_to_rmw_latency: 10
rmw_to_ait_latency: 10
local_read_latency: 50
local_write_latency: 50

[ait]
lsq_entries: 4
lmemq_entries: 4
buffer_entries: 4
wear_leveling_threshold: 0
migration_block_entries: 0
migration_latency: 0
local_read_latency: 5
local_write_latency: 5

[ddr4]
channel: 1
rank: 1
bank_group: 1
bank: 1
row: 1024
col: 1024
rate: 1600
freq: 800
tCK: 1.25
nBL: 4
nCCDS: 4
nCCDL: 5
nRTRS: 2
nCL: 11
nRCD: 11
nRP: 11
nCWL: 9
nRAS: 28
nRC: 39
nRTP: 6
nWTRS: 2
nWTRL: 6
nWR: 12
nRRDS: 4
nRRDL: 5
nFAW: 20
nRFC: 160
nREFI: 7800
";

/// Builds a `Simulator` over the shared harness organization, initializing
/// `tracing` once so `RUST_LOG` can surface per-tick traces while debugging a
/// failing test.
pub fn build_simulator() -> Simulator {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
    let cfg = RootConfig::parse(DEFAULT_CONFIG).expect("harness config must parse");
    let tree = factory::build(&cfg).expect("harness config must build a tree");
    Simulator::new(tree)
}

/// Runs `trace_text` (one line per access, see [`nvsim_core::trace::parse`])
/// against a fresh harness tree and returns the rendered
/// `cnt.<domain>.<sub_domain>.<name>: <count>` dump.
pub fn run_trace(trace_text: &str) -> String {
    let mut sim = build_simulator();
    let trace = parse(trace_text).expect("harness trace must parse");
    let _ = sim.run(&trace);

    let mut dumper = Dumper::new(DumpType::Cli, "unused", "unused", "0");
    sim.print_counters(&mut dumper);
    dumper.dump_as_string()
}

/// Pulls a single `cnt.<domain>.<sub_domain>.<name>` value out of a dump
/// produced by [`run_trace`], panicking if the line is absent.
pub fn counter(dump: &str, full_name: &str) -> u64 {
    dump.lines()
        .find_map(|line| line.strip_prefix(&format!("cnt.{full_name}: ")))
        .unwrap_or_else(|| panic!("counter {full_name} not present in dump:\n{dump}"))
        .trim()
        .parse()
        .unwrap_or_else(|_| panic!("counter {full_name} had a non-numeric value"))
}
