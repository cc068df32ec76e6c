//! Bus primitives and abstractions
//!
//! This module defines the latch-level bus every NAND access is built from,
//! plus a memory-mapped implementation for external-memory-controller
//! setups where the command, address and data latches are plain byte
//! registers.

pub mod latch;
mod traits;

pub use latch::LatchBus;
pub use traits::*;
