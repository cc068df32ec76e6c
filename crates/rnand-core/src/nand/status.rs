//! Status register decoding
//!
//! The status byte returned after a STATUS command carries a pass/fail bit
//! for program and erase operations; reads have no fail bit, readiness is
//! all there is to check.

use bitflags::bitflags;

use crate::bus::NandBus;
use crate::error::{IoFailure, Result};

use super::opcodes;
use super::protocol::Timeouts;

bitflags! {
    /// Status register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u8 {
        /// Last program/erase failed (1) or passed (0)
        const FAIL          = 1 << 0;
        /// Array ready (no internal operation running, including cache)
        const ARRAY_READY   = 1 << 5;
        /// Ready/busy (1 = ready)
        const READY         = 1 << 6;
        /// Write protect (1 = not protected)
        const NOT_PROTECTED = 1 << 7;

        /// Both ready bits that must be set before the status is sampled
        const IDLE = Self::ARRAY_READY.bits() | Self::READY.bits();
    }
}

/// Operation whose outcome a status byte is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Page program or copy-back program
    Program,
    /// Block erase
    Erase,
    /// Page read
    Read,
}

/// Issue STATUS and sample the status byte once the chip reports idle
///
/// Polls until bits 5 and 6 are both set. The write-protect bit is not
/// part of the idle condition. Returns `IoFailure::Timeout` if the chip does
/// not go idle within `timeouts.status_polls` samples.
pub fn read_status<B: NandBus + ?Sized>(bus: &mut B, timeouts: &Timeouts) -> Result<u8> {
    bus.send_command(opcodes::STATUS);

    for _ in 0..timeouts.status_polls {
        let raw = bus.read_byte();
        if StatusFlags::from_bits_retain(raw).contains(StatusFlags::IDLE) {
            log::trace!("status 0x{:02X}", raw);
            return Ok(raw);
        }
        if timeouts.poll_delay_us > 0 {
            bus.delay_us(timeouts.poll_delay_us);
        }
    }

    log::warn!("status register never reported idle");
    Err(IoFailure::Timeout.into())
}

/// Decode a status byte for the given operation
///
/// Returns `true` if the operation passed. Program and erase fail when
/// bit 0 is set; a read passes whenever the chip reported ready.
pub fn decode(raw: u8, kind: OperationKind) -> bool {
    match kind {
        OperationKind::Program | OperationKind::Erase => {
            !StatusFlags::from_bits_retain(raw).contains(StatusFlags::FAIL)
        }
        OperationKind::Read => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_program_and_erase() {
        assert!(decode(0xE0, OperationKind::Program));
        assert!(!decode(0xE1, OperationKind::Program));
        assert!(decode(0x60, OperationKind::Erase));
        assert!(!decode(0x61, OperationKind::Erase));
    }

    #[test]
    fn test_decode_read_ignores_fail_bit() {
        assert!(decode(0xE0, OperationKind::Read));
        assert!(decode(0xE1, OperationKind::Read));
    }

    #[test]
    fn test_write_protect_bit_is_ignored() {
        // bit 7 clear means protected, which does not affect pass/fail
        assert!(decode(0x60, OperationKind::Program));
        assert!(decode(0xE0, OperationKind::Program));
    }

    #[test]
    fn test_idle_mask() {
        assert_eq!(StatusFlags::IDLE.bits(), 0x60);
        assert!(!StatusFlags::from_bits_retain(0x40).contains(StatusFlags::IDLE));
        assert!(StatusFlags::from_bits_retain(0xE1).contains(StatusFlags::IDLE));
    }
}
