//! Common types shared across every controller and media model.
//!
//! This module provides the fundamental building blocks used throughout the
//! simulator:
//! 1. **Clock:** A dedicated simulation-tick newtype with an explicit
//!    "unset" sentinel.
//! 2. **Addresses:** Strong types for logical addresses and the block
//!    addresses the RMW and AIT controllers key their buffers on.
//! 3. **Constants:** Block sizes and bitmasks for the RMW/AIT/cache-line
//!    granularities.
//! 4. **Requests:** The request/response types that flow between
//!    components, plus the completion-callback contract.
//! 5. **Errors:** The crate-wide error type.

/// Logical and block address types.
pub mod addr;

/// Block-size and bitmask constants.
pub mod constants;

/// Simulation clock type.
pub mod clock;

/// Crate-wide error type.
pub mod error;

/// Request, response, and completion-callback types.
pub mod request;

pub use addr::{AitBlockAddr, BlockAddr, LogicalAddr};
pub use clock::Clock;
pub use error::SimError;
pub use request::{Callback, Request, RequestKind, Response};
