//! End-to-end RMW dispatch scenarios, driven through the full
//! `imc -> rmw -> ait -> ddr4` tree rather than `Rmw` in isolation, so the
//! counters these assert on reflect real queueing and media delay rather
//! than a hand-picked clock sequence.

use rstest::rstest;

use crate::common::harness::{counter, run_trace};

#[test]
fn a_first_touch_read_is_a_cold_read() {
    let dump = run_trace("0x0 R\n");
    assert_eq!(counter(&dump, "rmw.events.read_access"), 1);
    assert_eq!(counter(&dump, "rmw.events.read_cold"), 1);
    assert_eq!(counter(&dump, "rmw.events.read_fast_forward"), 0);
}

#[test]
fn a_second_read_of_a_clean_block_fast_forwards_off_the_buffer() {
    let dump = run_trace("0x0 R\n0x0 R\n");
    assert_eq!(counter(&dump, "rmw.events.read_cold"), 1);
    assert_eq!(counter(&dump, "rmw.events.read_fast_forward"), 1);
}

#[test]
fn a_third_distinct_block_evicts_the_oldest_clean_entry() {
    // buffer_entries is 2 in the harness organization; large idle gaps let
    // each read fully quiesce (and so become evictable) before the next
    // one lands on a new block.
    let dump = run_trace("0x0 R:200\n0x100 R:200\n0x200 R:200\n");
    assert_eq!(counter(&dump, "rmw.events.read_access"), 3);
    assert_eq!(counter(&dump, "rmw.events.read_cold"), 3);
    assert_eq!(counter(&dump, "rmw.events.eviction"), 1);
}

#[rstest]
#[case("0x0 W\n", 1, 0, 0)] // a write to a never-seen block runs the full read-modify-write cycle
#[case("0x0 R:200\n0x0 W:0\n", 0, 1, 0)] // a write to an already-cached clean block just patches it
fn write_dispatch_depends_on_whether_the_block_is_already_buffered(
    #[case] trace: &str,
    #[case] expect_write_rmw: u64,
    #[case] expect_write_patch: u64,
    #[case] expect_write_comb: u64,
) {
    let dump = run_trace(trace);
    assert_eq!(counter(&dump, "rmw.events.write_rmw"), expect_write_rmw);
    assert_eq!(counter(&dump, "rmw.events.write_patch"), expect_write_patch);
    assert_eq!(counter(&dump, "rmw.events.write_comb"), expect_write_comb);
}
