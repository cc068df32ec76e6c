//! Raw NAND protocol
//!
//! Command set, status decoding, geometry/address translation and the
//! page/block operation sequences built on top of [`crate::bus::NandBus`].

mod geometry;
pub mod opcodes;
pub mod protocol;
pub mod status;

pub use geometry::{Geometry, PageAddress, MAX_OOB_SIZE};
pub use protocol::{OpContext, PageStatus, Phase, Timeouts};
pub use status::{OperationKind, StatusFlags};
