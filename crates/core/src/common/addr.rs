//! Logical and block address types.
//!
//! This module defines strong types for the address spaces the controllers
//! key their buffers on, plus the splitting math between them:
//! 1. **Type Safety:** Distinguishes a raw logical address from the block
//!    addresses the RMW and AIT controllers use as hash-map keys.
//! 2. **Address Manipulation:** Block-alignment and offset helpers used by
//!    every controller's `issue_request`.

use crate::common::constants::{
    AIT_BLOCK_OFFSET_MASK, CACHE_LINE_SHIFT, RMW_BLOCK_OFFSET_MASK, RMW_BLOCK_SHIFT,
};

/// A byte-granular address in the simulated logical address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalAddr(pub u64);

/// The 256 B-aligned block address an RMW buffer entry is keyed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockAddr(pub u64);

/// The 4096 B-aligned block address an AIT buffer entry is keyed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AitBlockAddr(pub u64);

impl LogicalAddr {
    /// Creates a new logical address from a raw 64-bit value.
    #[inline(always)]
    pub fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub fn val(&self) -> u64 {
        self.0
    }

    /// Returns the RMW block this address falls in.
    #[inline]
    pub fn rmw_block(&self) -> BlockAddr {
        BlockAddr(self.0 & !RMW_BLOCK_OFFSET_MASK)
    }

    /// Returns the byte offset within the RMW block (0..256).
    #[inline]
    pub fn rmw_offset(&self) -> u64 {
        self.0 & RMW_BLOCK_OFFSET_MASK
    }

    /// Returns the index (0..4) of the cache line within the RMW block.
    #[inline]
    pub fn rmw_cl_index(&self) -> usize {
        (self.rmw_offset() >> CACHE_LINE_SHIFT) as usize
    }

    /// Returns the AIT block this address falls in.
    #[inline]
    pub fn ait_block(&self) -> AitBlockAddr {
        AitBlockAddr(self.0 & !AIT_BLOCK_OFFSET_MASK)
    }

    /// Returns the byte offset within the AIT block (0..4096).
    #[inline]
    pub fn ait_offset(&self) -> u64 {
        self.0 & AIT_BLOCK_OFFSET_MASK
    }

    /// Returns the index (0..16) of the RMW block within the AIT block.
    #[inline]
    pub fn ait_rmw_index(&self) -> usize {
        (self.ait_offset() >> RMW_BLOCK_SHIFT) as usize
    }
}

impl BlockAddr {
    /// Returns the raw 64-bit block address value.
    #[inline(always)]
    pub fn val(&self) -> u64 {
        self.0
    }
}

impl AitBlockAddr {
    /// Returns the raw 64-bit block address value.
    #[inline(always)]
    pub fn val(&self) -> u64 {
        self.0
    }
}
