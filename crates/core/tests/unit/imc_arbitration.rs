//! IMC arbitration tested against a mocked next level, isolating the
//! tie-break and back-pressure logic from any real media timing. Queue
//! state is private, so these tests read it back through the same
//! counters a real deployment would dump, not through field access.

use mockall::predicate::always;
use nvsim_core::common::{Clock, LogicalAddr, Request, RequestKind, Response};
use nvsim_core::config::{RootConfig, Section};
use nvsim_core::imc::Imc;
use nvsim_core::stats::{DumpType, Dumper};
use nvsim_core::Component;
use rstest::rstest;

use crate::common::harness::counter;
use crate::common::mocks::next_level::MockNextLevel;

fn section(wpq_entries: &str, rpq_entries: &str) -> Section {
    let text = format!("[imc]\nwpq_entries: {wpq_entries}\nrpq_entries: {rpq_entries}\nadr_epoch: 0\n");
    RootConfig::parse(&text).unwrap().section("imc").unwrap().clone()
}

fn dump(imc: &Imc) -> String {
    let mut dumper = Dumper::new(DumpType::Cli, "unused", "unused", "0");
    imc.print_counters(&mut dumper);
    dumper.dump_as_string()
}

#[rstest]
#[case(0, 0, "write_access")] // a tie goes to the write queue
#[case(5, 0, "read_access")] // a strictly older read goes first
#[case(0, 5, "write_access")] // a strictly older write goes first
fn tick_current_picks_the_older_queue_ties_to_write(
    #[case] write_arrive: u64,
    #[case] read_arrive: u64,
    #[case] expect_counter: &str,
) {
    let sec = section("4", "4");
    let mut child = MockNextLevel::new();
    let _ = child.expect_full().returning(|| false);
    let _ = child.expect_issue_request().times(1).with(always()).returning(|_req| Response::accepted_at(Clock(10)));
    let mut imc = Imc::new(&sec, Box::new(child)).unwrap();

    let _ = imc.issue_request(Request::new(RequestKind::Write, LogicalAddr(0x40), Clock(write_arrive)));
    let _ = imc.issue_request(Request::new(RequestKind::Read, LogicalAddr(0x80), Clock(read_arrive)));
    imc.tick_current(Clock(10));

    let d = dump(&imc);
    assert_eq!(counter(&d, &format!("imc.events.{expect_counter}")), 1);
    let other = if expect_counter == "write_access" { "read_access" } else { "write_access" };
    assert_eq!(counter(&d, &format!("imc.events.{other}")), 0);
}

#[test]
fn tick_current_does_not_forward_when_next_level_is_full() {
    let sec = section("4", "4");
    let mut child = MockNextLevel::new();
    let _ = child.expect_full().returning(|| true);
    let mut imc = Imc::new(&sec, Box::new(child)).unwrap();

    let _ = imc.issue_request(Request::new(RequestKind::Write, LogicalAddr(0x40), Clock(0)));
    imc.tick_current(Clock(0));

    let d = dump(&imc);
    assert_eq!(counter(&d, "imc.events.write_access"), 0, "a full next level must leave the request queued");
}

#[test]
fn forward_failure_is_counted_separately_from_the_access_itself() {
    let sec = section("4", "4");
    let mut child = MockNextLevel::new();
    let _ = child.expect_full().returning(|| false);
    let _ = child.expect_issue_request().times(1).with(always()).returning(|_req| Response::REJECTED);
    let mut imc = Imc::new(&sec, Box::new(child)).unwrap();

    let _ = imc.issue_request(Request::new(RequestKind::Write, LogicalAddr(0x40), Clock(0)));
    imc.tick_current(Clock(0));

    let d = dump(&imc);
    assert_eq!(counter(&d, "imc.events.write_access"), 1, "the access itself is counted regardless of outcome");
    assert_eq!(counter(&d, "imc.events.next_level_issue_fail"), 1);
}

#[test]
fn wpq_full_flush_drains_eagerly_even_when_the_normal_turn_services_the_read_queue() {
    let sec = section("2", "4");
    let mut child = MockNextLevel::new();
    let _ = child.expect_full().returning(|| false);
    // one issue_request for the read the normal turn services, two more as
    // flush_wpq drains both still-queued writes.
    let _ = child.expect_issue_request().times(3).with(always()).returning(|_req| Response::accepted_at(Clock(10)));
    let mut imc = Imc::new(&sec, Box::new(child)).unwrap();

    let _ = imc.issue_request(Request::new(RequestKind::Read, LogicalAddr(0), Clock(0)));
    let _ = imc.issue_request(Request::new(RequestKind::Write, LogicalAddr(0x40), Clock(5)));
    let _ = imc.issue_request(Request::new(RequestKind::Write, LogicalAddr(0x80), Clock(5)));
    imc.tick_current(Clock(10));

    let d = dump(&imc);
    assert_eq!(counter(&d, "imc.events.read_access"), 1, "the older read is serviced on the normal turn");
    assert_eq!(counter(&d, "imc.events.write_access"), 0, "writes are drained by the flush, not the normal turn");
    assert_eq!(counter(&d, "imc.events.wpq_full_flush"), 1);

    // the flush must have fully drained wpq: two fresh writes should both
    // fit without tripping the capacity-2 queue again.
    assert!(imc.issue_request(Request::new(RequestKind::Write, LogicalAddr(0x100), Clock(10))).accepted);
    assert!(imc.issue_request(Request::new(RequestKind::Write, LogicalAddr(0x140), Clock(10))).accepted);
}
