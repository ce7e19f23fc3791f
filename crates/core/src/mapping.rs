//! Address-mapping functions used to route a request to one of several
//! children.
//!
//! A component with more than one child (for example an RMC fronting
//! several IMC channels) needs a way to decide which child a given address
//! belongs to, and what address that child should see. A
//! [`ComponentMappingFn`] does both in one call: it returns the
//! (possibly rewritten) address together with the selected child index.

use crate::common::{LogicalAddr, SimError};

/// Maps a logical address to `(address seen by the child, child index)`.
pub type ComponentMappingFn = fn(LogicalAddr) -> (LogicalAddr, usize);

/// Identity mapping that always routes to child 0.
///
/// The default for any component with exactly one child, where no splitting
/// decision is actually needed.
pub fn none_mapping(addr: LogicalAddr) -> (LogicalAddr, usize) {
    (addr, 0)
}

/// Spreads consecutive 4 KiB pages round-robin across `n` children.
///
/// `stride_mapping_4096(addr, n) = (((addr >> 12) / n) << 12 | (addr &
/// 0xfff), (addr >> 12) % n)`.
pub fn stride_mapping_4096(n: usize) -> impl Fn(LogicalAddr) -> (LogicalAddr, usize) {
    move |addr: LogicalAddr| {
        let page = addr.val() >> 12;
        let offset = addr.val() & 0xfff;
        let child = (page as usize) % n;
        let child_page = (page as usize) / n;
        (LogicalAddr(((child_page as u64) << 12) | offset), child)
    }
}

/// Resolves a mapping function name from config into a concrete
/// [`ComponentMappingFn`]-shaped closure.
///
/// Only `none_mapping` is returnable as a bare function pointer since
/// `stride_mapping_4096` is parameterized on the child count; callers that
/// need stride mapping should call [`stride_mapping_4096`] directly once
/// they know the child count.
pub fn is_known_mapping_name(name: &str) -> bool {
    matches!(name, "none_mapping" | "stride_mapping_4096")
}

/// Validates a mapping function name, returning an error for unknown names.
pub fn check_mapping_name(name: &str) -> Result<(), SimError> {
    if is_known_mapping_name(name) {
        Ok(())
    } else {
        Err(SimError::UnknownMappingFunction(name.to_string()))
    }
}

/// Builds a boxed mapping closure from a config-supplied name and child
/// count.
///
/// Boxed rather than returned as a bare [`ComponentMappingFn`] since
/// `stride_mapping_4096` closes over `n` and cannot be represented as a
/// function pointer.
pub fn build_mapping(name: &str, child_count: usize) -> Result<Box<dyn Fn(LogicalAddr) -> (LogicalAddr, usize)>, SimError> {
    match name {
        "none_mapping" => Ok(Box::new(none_mapping)),
        "stride_mapping_4096" => Ok(Box::new(stride_mapping_4096(child_count))),
        _ => Err(SimError::UnknownMappingFunction(name.to_string())),
    }
}
