//! Bit-alignment and coverage properties of the two address functions that
//! decide how a logical address turns into DRAM coordinates or a child
//! index: [`stride_mapping_4096`] (RMC fan-out) and [`decode_address`]
//! (DDR4 bank geometry).

use nvsim_core::common::LogicalAddr;
use nvsim_core::ddr4::media::{decode_address, Geometry};
use nvsim_core::mapping::stride_mapping_4096;
use proptest::prelude::*;

fn pow2(max_log2: u32) -> impl Strategy<Value = usize> {
    (0..=max_log2).prop_map(|e| 1usize << e)
}

fn geometry() -> impl Strategy<Value = Geometry> {
    (pow2(1), pow2(1), pow2(2), pow2(3), pow2(7), pow2(7)).prop_map(
        |(channel, rank, bank_group, bank, row, col)| Geometry { channel, rank, bank_group, bank, row, col },
    )
}

proptest! {
    /// `stride_mapping_4096` spreads consecutive 4 KiB pages round-robin
    /// across `n` children and is invertible: reconstructing the page from
    /// `(child_addr, child_index)` must always recover the original page.
    #[test]
    fn stride_mapping_round_trips(n in 1usize..8, addr in any::<u64>()) {
        let mapping = stride_mapping_4096(n);
        let (child_addr, child) = mapping(LogicalAddr(addr));

        prop_assert!(child < n);

        let child_page = child_addr.val() >> 12;
        let offset = child_addr.val() & 0xfff;
        let original_page = child_page * (n as u64) + (child as u64);
        let reconstructed = (original_page << 12) | offset;

        prop_assert_eq!(reconstructed, addr);
    }

    /// `stride_mapping_4096` never changes the low 12 bits (the in-page
    /// offset) of an address.
    #[test]
    fn stride_mapping_preserves_page_offset(n in 1usize..8, addr in any::<u64>()) {
        let mapping = stride_mapping_4096(n);
        let (child_addr, _) = mapping(LogicalAddr(addr));
        prop_assert_eq!(child_addr.val() & 0xfff, addr & 0xfff);
    }

    /// `decode_address` never decodes an index past the geometry's own
    /// count at any level, for geometries whose counts are exact powers of
    /// two (the only case where `ceil_log2` yields a tight mask).
    #[test]
    fn decode_address_indices_stay_in_bounds(geometry in geometry(), addr in any::<u64>()) {
        let dram = decode_address(addr, &geometry, "ChRaBgBaRoCo").unwrap();
        prop_assert!(dram.channel < geometry.channel);
        prop_assert!(dram.rank < geometry.rank);
        prop_assert!(dram.bank_group < geometry.bank_group);
        prop_assert!(dram.bank < geometry.bank);
    }

    /// Decoding is a pure function of its inputs: the same address against
    /// the same geometry and order always decodes identically.
    #[test]
    fn decode_address_is_deterministic(geometry in geometry(), addr in any::<u64>()) {
        let first = decode_address(addr, &geometry, "ChRaBgBaRoCo").unwrap();
        let second = decode_address(addr, &geometry, "ChRaBgBaRoCo").unwrap();
        prop_assert_eq!(first, second);
    }
}

#[test]
fn decode_address_rejects_malformed_order() {
    let geometry = Geometry { channel: 1, rank: 1, bank_group: 1, bank: 1, row: 16, col: 16 };
    assert!(decode_address(0, &geometry, "TooShort").is_err());
}
