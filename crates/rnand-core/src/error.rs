//! Error types for rnand-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. Every engine operation ends in one of four
//! outcomes: success, [`Error::OutOfRange`], [`Error::Io`] or an ECC
//! mismatch (which is reported as [`crate::PageStatus::EccMismatch`] while the
//! data is still delivered, and can be promoted to [`Error::EccMismatch`]).

use core::fmt;

/// Details about a hardware-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoFailure {
    /// The status register reported a failed page program
    ProgramFailed {
        /// Absolute page that was being programmed
        page: u32,
    },
    /// The status register reported a failed block erase
    EraseFailed {
        /// Absolute block that was being erased
        block: u32,
    },
    /// The status register reported a failed copy-back program
    CopyBackFailed {
        /// Absolute source page
        src: u32,
        /// Absolute destination page
        dst: u32,
    },
    /// The chip did not become ready within the configured polling budget
    Timeout,
    /// A caller-supplied argument cannot be turned into a bus sequence
    /// (missing data buffer on write, wrong buffer length, ...)
    InvalidArgument,
}

/// Reasons a partition cannot be registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Another partition with the same name is already registered
    DuplicateName,
    /// The partition's block range overlaps an already registered partition
    OverlappingPartitions {
        /// First absolute block claimed by both partitions
        block: u32,
    },
    /// The geometry is inconsistent (see [`crate::Geometry::validate`])
    InvalidGeometry(&'static str),
    /// The partition's page layout does not match the chip's page layout
    LayoutMismatch,
    /// No partition is registered under the requested name or handle
    NotFound,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Address resolution failed; the bus was not touched
    OutOfRange {
        /// Absolute block the request resolved to
        block: u32,
        /// Last block of the partition
        block_end: u32,
    },
    /// Hardware signaled a failure, did not become ready, or the request
    /// was malformed. The chip has been reset where a command was in flight.
    Io(IoFailure),
    /// Page data did not match the ECC stored in its OOB area
    EccMismatch {
        /// Absolute block of the page
        block: u32,
        /// Page offset within the block
        page: u32,
    },
    /// Partition registration failed
    Registry(RegistryError),
}

impl From<IoFailure> for Error {
    fn from(failure: IoFailure) -> Self {
        Self::Io(failure)
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl fmt::Display for IoFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgramFailed { page } => write!(f, "program failed at page {}", page),
            Self::EraseFailed { block } => write!(f, "erase failed at block {}", block),
            Self::CopyBackFailed { src, dst } => {
                write!(f, "copy-back from page {} to page {} failed", src, dst)
            }
            Self::Timeout => write!(f, "timed out waiting for the chip to become ready"),
            Self::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName => write!(f, "a partition with this name is already registered"),
            Self::OverlappingPartitions { block } => {
                write!(f, "partition overlaps an existing partition at block {}", block)
            }
            Self::InvalidGeometry(reason) => write!(f, "invalid geometry: {}", reason),
            Self::LayoutMismatch => write!(f, "partition page layout differs from the chip"),
            Self::NotFound => write!(f, "partition not found"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { block, block_end } => write!(
                f,
                "block {} is beyond the partition end (block {})",
                block, block_end
            ),
            Self::Io(failure) => write!(f, "I/O error: {}", failure),
            Self::EccMismatch { block, page } => {
                write!(f, "ECC mismatch at block {}, page {}", block, page)
            }
            Self::Registry(err) => write!(f, "registry error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
