//! Standard large-page NAND command opcodes
//!
//! These are the ONFI / legacy large-page (2 KiB) command codes understood
//! by practically every byte-wide SLC NAND chip.

// ============================================================================
// Identification and control
// ============================================================================

/// Read ID, followed by one address byte (0x00)
pub const READID: u8 = 0x90;
/// Read Status register
pub const STATUS: u8 = 0x70;
/// Reset - aborts the current operation and returns the chip to idle
pub const RESET: u8 = 0xFF;

// ============================================================================
// Read
// ============================================================================

/// Page read, first cycle (column + row address follow)
pub const READ0: u8 = 0x00;
/// Page read, second cycle - starts the array-to-register transfer
pub const READSTART: u8 = 0x30;
/// Read for copy-back, second cycle
pub const READ_CB: u8 = 0x35;

// ============================================================================
// Program
// ============================================================================

/// Serial data input - program setup
pub const SEQIN: u8 = 0x80;
/// Program confirm - starts the register-to-array transfer
pub const PAGEPROG: u8 = 0x10;
/// Copy-back program setup
pub const CB_PROG: u8 = 0x85;

// ============================================================================
// Erase
// ============================================================================

/// Block erase setup (row address follows)
pub const ERASE1: u8 = 0x60;
/// Block erase confirm
pub const ERASE2: u8 = 0xD0;
