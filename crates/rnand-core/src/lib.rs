//! rnand-core - Core library for raw parallel NAND flash access
//!
//! This crate turns a byte-wide parallel NAND chip, driven only through its
//! command/address/data latches and a ready/busy line, into page-addressable
//! read, program, erase and copy-back operations with out-of-band (OOB)
//! metadata and ECC verification. It is designed to be `no_std` compatible
//! for use in embedded environments.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`) and the TOML
//!   partition table loader
//! - `alloc` - Enable heap allocation for the partition registry
//!
//! # Example
//!
//! ```ignore
//! use rnand_core::bus::NandBus;
//! use rnand_core::registry::{NandChip, PageDevice};
//! use rnand_core::{EccMode, Geometry};
//!
//! fn dump_first_page<B: NandBus>(bus: B) -> rnand_core::Result<()> {
//!     let mut chip = NandChip::new(bus, EccMode::Hamming256);
//!     let id = chip.register("nand0", Geometry::hy27uf081g(0, 511))?;
//!     let mut data = [0u8; 2048];
//!     let status = chip.partition(id)?.read_page(0, Some(&mut data), None)?;
//!     println!("page 0: {:?}", status);
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod ecc;
pub mod error;
pub mod nand;
#[cfg(feature = "alloc")]
pub mod registry;

pub use ecc::EccMode;
pub use error::{Error, IoFailure, Result};
pub use nand::{Geometry, PageAddress, PageStatus};
