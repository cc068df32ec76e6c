//! rnand-dummy - In-memory raw NAND emulator for testing
//!
//! This crate provides a simulated byte-wide NAND chip that speaks the
//! command/address/data latch protocol on a [`NandBus`]. It's useful for
//! testing and development without real hardware.
//!
//! Besides storage the emulator keeps a trace of latched commands and
//! addresses, and lets tests inject faults: failed program/erase status, a
//! chip stuck busy, or bit flips in stored pages.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::collections::BTreeMap;
#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use rnand_core::bus::NandBus;
use rnand_core::nand::{opcodes, StatusFlags};
use rnand_core::Geometry;

/// Configuration for the dummy chip
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Manufacturer and device ID returned by READID
    pub id: [u8; 2],
    /// Data bytes per page
    pub page_size: usize,
    /// OOB bytes per page
    pub oob_size: usize,
    /// Pages per block
    pub pages_per_block: u32,
    /// Number of blocks
    pub blocks: u32,
    /// Row address cycles
    pub row_cycles: u8,
    /// Ready/busy samples the chip stays busy after starting an operation
    pub busy_samples: u32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            id: [0xAD, 0xF1], // Hynix HY27UF081G2A
            page_size: 2048,
            oob_size: 64,
            pages_per_block: 64,
            blocks: 1024,
            row_cycles: 2,
            busy_samples: 3,
        }
    }
}

impl DummyConfig {
    /// Configuration whose page layout matches `geometry`, covering at least
    /// its last block
    pub fn for_geometry(geometry: &Geometry) -> Self {
        Self {
            page_size: geometry.page_size,
            oob_size: geometry.oob_size,
            pages_per_block: geometry.pages_per_block,
            blocks: geometry.block_end + 1,
            row_cycles: geometry.row_cycles,
            ..Self::default()
        }
    }

    /// Bytes per page including OOB
    pub fn raw_page_size(&self) -> usize {
        self.page_size + self.oob_size
    }

    /// Total pages on the chip
    pub fn total_pages(&self) -> u32 {
        self.blocks * self.pages_per_block
    }
}

/// A latch cycle seen by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// Command latch
    Command(u8),
    /// Address latch
    Address(u8),
}

/// What the chip is doing with the cycles it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    ReadId,
    Read,
    Program,
    CopyBackProgram,
    Erase,
    Status,
}

/// Dummy NAND chip
///
/// Emulates a raw NAND chip in memory. Pages that were never programmed
/// read as erased (0xFF) and take no memory.
#[cfg(feature = "alloc")]
pub struct DummyNand {
    config: DummyConfig,
    pages: BTreeMap<u32, Vec<u8>>,
    register: Vec<u8>,
    mode: Mode,
    address: Vec<u8>,
    column: usize,
    output: Vec<u8>,
    status: u8,
    busy: u32,
    stuck_busy: bool,
    fail_program: bool,
    fail_erase: bool,
    trace: Vec<BusEvent>,
    bytes_read: usize,
    bytes_written: usize,
}

#[cfg(feature = "alloc")]
impl DummyNand {
    /// Create a new, fully erased dummy chip
    pub fn new(config: DummyConfig) -> Self {
        let register = vec![0xFF; config.raw_page_size()];
        Self {
            config,
            pages: BTreeMap::new(),
            register,
            mode: Mode::Idle,
            address: Vec::new(),
            column: 0,
            output: Vec::new(),
            status: StatusFlags::IDLE.bits() | StatusFlags::NOT_PROTECTED.bits(),
            busy: 0,
            stuck_busy: false,
            fail_program: false,
            fail_erase: false,
            trace: Vec::new(),
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Create a new dummy chip with default configuration (HY27UF081G2A)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy chip from a raw image (pages of data + OOB, in order)
    ///
    /// Pages that are entirely 0xFF are not stored. A short image leaves the
    /// remaining pages erased.
    pub fn with_image(config: DummyConfig, image: &[u8]) -> Self {
        let mut chip = Self::new(config);
        let raw = chip.config.raw_page_size();
        for (row, page) in image
            .chunks(raw)
            .take(chip.config.total_pages() as usize)
            .enumerate()
        {
            if page.iter().any(|&b| b != 0xFF) {
                let mut stored = vec![0xFF; raw];
                stored[..page.len()].copy_from_slice(page);
                chip.pages.insert(row as u32, stored);
            }
        }
        chip
    }

    /// Dump the whole chip as a raw image
    pub fn image(&self) -> Vec<u8> {
        let raw = self.config.raw_page_size();
        let mut image = vec![0xFF; raw * self.config.total_pages() as usize];
        for (&row, page) in &self.pages {
            let start = row as usize * raw;
            image[start..start + raw].copy_from_slice(page);
        }
        image
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Raw contents (data + OOB) of an absolute page
    pub fn raw_page(&self, row: u32) -> Vec<u8> {
        self.pages
            .get(&row)
            .cloned()
            .unwrap_or_else(|| vec![0xFF; self.config.raw_page_size()])
    }

    /// Flip bits of one stored byte (offset counts from the start of the
    /// data area; offsets past the page size land in the OOB)
    pub fn corrupt(&mut self, row: u32, offset: usize, mask: u8) {
        let raw = self.config.raw_page_size();
        let page = self.pages.entry(row).or_insert_with(|| vec![0xFF; raw]);
        page[offset] ^= mask;
    }

    /// Make the next program (or copy-back program) report failure
    pub fn fail_next_program(&mut self) {
        self.fail_program = true;
    }

    /// Make the next erase report failure
    pub fn fail_next_erase(&mut self) {
        self.fail_erase = true;
    }

    /// Hold the ready/busy line low until cleared
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Commands and addresses latched since the last `clear_trace`
    pub fn trace(&self) -> &[BusEvent] {
        &self.trace
    }

    /// Only the command bytes of the trace
    pub fn commands(&self) -> Vec<u8> {
        self.trace
            .iter()
            .filter_map(|event| match event {
                BusEvent::Command(code) => Some(*code),
                BusEvent::Address(_) => None,
            })
            .collect()
    }

    /// Data bytes read and written since the last `clear_trace`
    pub fn data_bytes(&self) -> (usize, usize) {
        (self.bytes_read, self.bytes_written)
    }

    /// Whether the bus has seen no cycle at all since the last `clear_trace`
    pub fn is_untouched(&self) -> bool {
        self.trace.is_empty() && self.bytes_read == 0 && self.bytes_written == 0
    }

    /// Forget the recorded trace and data counters
    pub fn clear_trace(&mut self) {
        self.trace.clear();
        self.bytes_read = 0;
        self.bytes_written = 0;
    }

    fn start_busy(&mut self) {
        self.busy = self.config.busy_samples;
    }

    fn set_pass(&mut self, pass: bool) {
        self.status = StatusFlags::IDLE.bits() | StatusFlags::NOT_PROTECTED.bits();
        if !pass {
            self.status |= StatusFlags::FAIL.bits();
        }
    }

    /// Column and row from the latched address bytes
    fn decode_page_address(&self) -> Option<(usize, u32)> {
        let cycles = 2 + self.config.row_cycles as usize;
        if self.address.len() != cycles {
            log::warn!(
                "dummy: expected {} address cycles, got {}",
                cycles,
                self.address.len()
            );
            return None;
        }
        let column = u16::from_le_bytes([self.address[0], self.address[1]]) as usize;
        Some((column, row_from(&self.address[2..])))
    }

    fn load_register(&mut self, row: u32) {
        if row < self.config.total_pages() {
            self.register = self.raw_page(row);
        } else {
            log::warn!("dummy: read of page {} beyond the chip", row);
            self.register.fill(0xFF);
        }
    }

    fn program_register(&mut self, row: u32) -> bool {
        if row >= self.config.total_pages() {
            log::warn!("dummy: program of page {} beyond the chip", row);
            return false;
        }
        if core::mem::take(&mut self.fail_program) {
            log::debug!("dummy: injected program failure at page {}", row);
            return false;
        }

        let raw = self.config.raw_page_size();
        let page = self.pages.entry(row).or_insert_with(|| vec![0xFF; raw]);
        // NAND programming can only change 1 -> 0
        for (stored, &byte) in page.iter_mut().zip(self.register.iter()) {
            *stored &= byte;
        }
        true
    }

    fn erase(&mut self, row: u32) -> bool {
        let block = row / self.config.pages_per_block;
        if block >= self.config.blocks {
            log::warn!("dummy: erase of block {} beyond the chip", block);
            return false;
        }
        if core::mem::take(&mut self.fail_erase) {
            log::debug!("dummy: injected erase failure at block {}", block);
            return false;
        }

        let first = block * self.config.pages_per_block;
        let last = first + self.config.pages_per_block;
        self.pages.retain(|&row, _| row < first || row >= last);
        true
    }

    fn confirm(&mut self, code: u8) {
        match (self.mode, code) {
            (Mode::Read, opcodes::READSTART) | (Mode::Read, opcodes::READ_CB) => {
                if let Some((column, row)) = self.decode_page_address() {
                    self.load_register(row);
                    self.column = column;
                }
                self.start_busy();
            }
            (Mode::Program, opcodes::PAGEPROG) | (Mode::CopyBackProgram, opcodes::PAGEPROG) => {
                let pass = match self.decode_page_address() {
                    Some((_, row)) => self.program_register(row),
                    None => false,
                };
                self.set_pass(pass);
                self.start_busy();
                self.mode = Mode::Idle;
            }
            (Mode::Erase, opcodes::ERASE2) => {
                let pass = if self.address.len() == self.config.row_cycles as usize {
                    let row = row_from(&self.address);
                    self.erase(row)
                } else {
                    false
                };
                self.set_pass(pass);
                self.start_busy();
                self.mode = Mode::Idle;
            }
            (mode, code) => {
                log::warn!("dummy: unexpected command 0x{:02X} in {:?}", code, mode);
                self.mode = Mode::Idle;
            }
        }
    }
}

/// Little-endian row number from the row address bytes
fn row_from(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .rev()
        .fold(0u32, |row, &byte| (row << 8) | byte as u32)
}

#[cfg(feature = "alloc")]
impl NandBus for DummyNand {
    fn send_command(&mut self, code: u8) {
        self.trace.push(BusEvent::Command(code));

        match code {
            opcodes::READID => {
                self.mode = Mode::ReadId;
                self.address.clear();
            }
            opcodes::READ0 => {
                self.mode = Mode::Read;
                self.address.clear();
            }
            opcodes::SEQIN => {
                self.mode = Mode::Program;
                self.address.clear();
                self.register.fill(0xFF);
                self.column = 0;
            }
            opcodes::CB_PROG => {
                // The page register keeps the copy-back source
                self.mode = Mode::CopyBackProgram;
                self.address.clear();
                self.column = 0;
            }
            opcodes::ERASE1 => {
                self.mode = Mode::Erase;
                self.address.clear();
            }
            opcodes::STATUS => {
                self.mode = Mode::Status;
            }
            opcodes::RESET => {
                self.mode = Mode::Idle;
                self.address.clear();
                self.busy = 0;
                self.fail_program = false;
                self.fail_erase = false;
                self.set_pass(true);
            }
            _ => self.confirm(code),
        }
    }

    fn send_address(&mut self, byte: u8) {
        self.trace.push(BusEvent::Address(byte));
        self.address.push(byte);

        if self.mode == Mode::ReadId {
            self.output = self.config.id.to_vec();
            self.column = 0;
        } else if matches!(self.mode, Mode::Program | Mode::CopyBackProgram)
            && self.address.len() >= 2
        {
            self.column = u16::from_le_bytes([self.address[0], self.address[1]]) as usize;
        }
    }

    fn read_byte(&mut self) -> u8 {
        self.bytes_read += 1;

        match self.mode {
            Mode::Status => {
                if self.stuck_busy {
                    StatusFlags::NOT_PROTECTED.bits()
                } else if self.busy > 0 {
                    self.busy -= 1;
                    StatusFlags::NOT_PROTECTED.bits()
                } else {
                    self.status
                }
            }
            Mode::ReadId => {
                let byte = self.output.get(self.column).copied().unwrap_or(0x00);
                self.column += 1;
                byte
            }
            Mode::Read => {
                let byte = self.register.get(self.column).copied().unwrap_or(0xFF);
                self.column += 1;
                byte
            }
            _ => 0xFF,
        }
    }

    fn write_byte(&mut self, value: u8) {
        self.bytes_written += 1;

        if matches!(self.mode, Mode::Program | Mode::CopyBackProgram) {
            if let Some(slot) = self.register.get_mut(self.column) {
                *slot = value;
            }
            self.column += 1;
        }
    }

    fn is_ready(&mut self) -> bool {
        if self.stuck_busy {
            return false;
        }
        if self.busy > 0 {
            self.busy -= 1;
            return false;
        }
        true
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rnand_core::nand::protocol::{self, Timeouts};

    fn small() -> DummyConfig {
        DummyConfig {
            blocks: 8,
            ..DummyConfig::default()
        }
    }

    #[test]
    fn test_read_id() {
        let mut chip = DummyNand::new_default();
        assert_eq!(protocol::read_id(&mut chip), [0xAD, 0xF1]);
        assert_eq!(
            chip.trace(),
            &[BusEvent::Command(opcodes::READID), BusEvent::Address(0)]
        );
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut chip = DummyNand::new(small());
        chip.send_command(opcodes::SEQIN);
        for byte in [0x00, 0x00, 0x05, 0x00] {
            chip.send_address(byte);
        }
        chip.write_bytes(&[0xF0, 0x0F]);
        chip.send_command(opcodes::PAGEPROG);
        protocol::wait_ready(&mut chip, &Timeouts::default()).unwrap();

        chip.send_command(opcodes::SEQIN);
        for byte in [0x00, 0x00, 0x05, 0x00] {
            chip.send_address(byte);
        }
        chip.write_bytes(&[0x3C, 0xFF]);
        chip.send_command(opcodes::PAGEPROG);

        let page = chip.raw_page(5);
        assert_eq!(&page[..3], &[0x30, 0x0F, 0xFF]);
    }

    #[test]
    fn test_busy_then_ready() {
        let mut chip = DummyNand::new(small());
        chip.send_command(opcodes::ERASE1);
        chip.send_address(0x40);
        chip.send_address(0x00);
        chip.send_command(opcodes::ERASE2);
        assert!(!chip.is_ready());
        assert!(!chip.is_ready());
        assert!(!chip.is_ready());
        assert!(chip.is_ready());
    }

    #[test]
    fn test_image_round_trip() {
        let mut chip = DummyNand::new(small());
        chip.corrupt(3, 10, 0x01);
        chip.corrupt(9, 2100, 0x80);

        let image = chip.image();
        let raw = chip.config().raw_page_size();
        assert_eq!(image.len(), raw * 8 * 64);
        assert_eq!(image[3 * raw + 10], 0xFE);

        let copy = DummyNand::with_image(small(), &image);
        assert_eq!(copy.raw_page(9)[2100], 0x7F);
        assert_eq!(copy.raw_page(4), vec![0xFF; raw]);
    }

    #[test]
    fn test_reset_clears_failure() {
        let mut chip = DummyNand::new(small());
        chip.fail_next_erase();
        chip.send_command(opcodes::RESET);
        chip.send_command(opcodes::ERASE1);
        chip.send_address(0x00);
        chip.send_address(0x00);
        chip.send_command(opcodes::ERASE2);
        let status = protocol::wait_ready(&mut chip, &Timeouts::default())
            .and_then(|_| rnand_core::nand::status::read_status(&mut chip, &Timeouts::default()))
            .unwrap();
        assert_eq!(status & StatusFlags::FAIL.bits(), 0);
    }
}
