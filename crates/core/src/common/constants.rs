//! Block-size and bitmask constants for the RMW and AIT granularities.
//!
//! The simulator works at three nested granularities: the CPU cache line
//! (64 B), the RMW controller's write-combining block (256 B, four cache
//! lines), and the AIT controller's migration block (4096 B, sixteen RMW
//! blocks). These constants are the single source of truth for the
//! address-splitting math in [`crate::common::addr`].

/// Size in bytes of a CPU cache line.
pub const CACHE_LINE_SIZE: u64 = 64;
/// `log2(CACHE_LINE_SIZE)`.
pub const CACHE_LINE_SHIFT: u32 = 6;

/// Size in bytes of an RMW write-combining block.
pub const RMW_BLOCK_SIZE: u64 = 256;
/// `log2(RMW_BLOCK_SIZE)`.
pub const RMW_BLOCK_SHIFT: u32 = 8;
/// Offset bitmask within an RMW block.
pub const RMW_BLOCK_OFFSET_MASK: u64 = RMW_BLOCK_SIZE - 1;
/// Number of cache lines per RMW block.
pub const RMW_BLOCK_CL_COUNT: usize = (RMW_BLOCK_SIZE / CACHE_LINE_SIZE) as usize;

/// Size in bytes of an AIT migration block.
pub const AIT_BLOCK_SIZE: u64 = 4096;
/// `log2(AIT_BLOCK_SIZE)`.
pub const AIT_BLOCK_SHIFT: u32 = 12;
/// Offset bitmask within an AIT block.
pub const AIT_BLOCK_OFFSET_MASK: u64 = AIT_BLOCK_SIZE - 1;
/// Number of cache lines per AIT block.
pub const AIT_BLOCK_CL_COUNT: usize = (AIT_BLOCK_SIZE / CACHE_LINE_SIZE) as usize;
/// Number of RMW blocks per AIT block.
pub const AIT_BLOCK_RMW_COUNT: usize = (AIT_BLOCK_SIZE / RMW_BLOCK_SIZE) as usize;

/// Number of sequential sub-requests the AIT local-memory queue splits a
/// block access into.
pub const LMEMQ_SUBREQUEST_COUNT: usize = 4;
/// Size in bytes of a single local-memory sub-request.
pub const LMEMQ_SUBREQUEST_SIZE: u64 = CACHE_LINE_SIZE;

/// Default wear-leveling migration threshold: a block migrates every this
/// many writes to it.
pub const DEFAULT_MIGRATION_THRESHOLD: u64 = 1 << 16;
