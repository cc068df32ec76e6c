//! Raw NAND protocol implementation
//!
//! This module implements the page/block command sequences of a byte-wide
//! large-page NAND chip on top of the [`NandBus`] latch primitives.
//!
//! Every operation walks the same phases:
//!
//! ```text
//! Idle -> CommandIssued -> AddressLoaded -> Busy -> Transfer -> Complete
//!                              |                                  |
//!                              +--------------> Error <-----------+
//! ```
//!
//! Addresses are resolved and range-checked before the first bus cycle, so
//! an out-of-range request never touches the chip. A failed program, erase
//! or copy-back, and a chip that never becomes ready, are followed by a
//! RESET so the chip is usable for the next call.
//!
//! All functions take partition-relative page/block indices and an
//! [`OpContext`] carrying the partition geometry, the ECC codec and the
//! polling budget.

use crate::bus::NandBus;
use crate::ecc::EccCodec;
use crate::error::{Error, IoFailure, Result};

use super::geometry::{Geometry, PageAddress, MAX_OOB_SIZE};
use super::opcodes;
use super::status::{self, OperationKind};

/// Polling budget for ready/busy and status waits
///
/// Waits are bounded: a chip that never becomes ready yields
/// `IoFailure::Timeout` instead of hanging the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct Timeouts {
    /// Samples spent waiting for the chip to go busy after a confirm
    /// command (the edge may already have passed)
    pub busy_edge_polls: u32,
    /// Samples of the ready/busy line before giving up
    pub ready_polls: u32,
    /// Samples of the status register before giving up
    pub status_polls: u32,
    /// Delay between ready/status samples in microseconds
    pub poll_delay_us: u32,
    /// Settle time after RESET in microseconds
    pub reset_delay_us: u32,
}

impl Default for Timeouts {
    /// Sized for a 2 KiB-page SLC chip: tPROG ~200us, tBERS ~2ms,
    /// polled every microsecond with a 10x margin.
    fn default() -> Self {
        Self {
            busy_edge_polls: 256,
            ready_polls: 20_000,
            status_polls: 20_000,
            poll_delay_us: 1,
            reset_delay_us: 500,
        }
    }
}

/// Outcome of a successful page read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum PageStatus {
    /// Data verified (or no ECC was configured / requested)
    Ok,
    /// Data did not match its ECC; the uncorrected data was still delivered
    EccMismatch,
}

impl PageStatus {
    /// Whether the page verified cleanly
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Promote an ECC mismatch to `Error::EccMismatch` for callers that
    /// treat it as fatal
    pub fn check(self, addr: &PageAddress) -> Result<()> {
        match self {
            Self::Ok => Ok(()),
            Self::EccMismatch => Err(Error::EccMismatch {
                block: addr.block,
                page: addr.page,
            }),
        }
    }
}

/// Phase of an in-flight command sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No command issued yet
    Idle,
    /// A command byte has been latched
    CommandIssued,
    /// The address cycles have been latched
    AddressLoaded,
    /// Waiting for the chip to become ready
    Busy,
    /// Streaming data through the data latch
    Transfer,
    /// Sequence finished successfully
    Complete,
    /// Sequence failed
    Error,
}

/// Everything an operation needs besides the bus
#[derive(Clone, Copy)]
pub struct OpContext<'a> {
    /// Partition geometry
    pub geometry: &'a Geometry,
    /// ECC codec, `None` to skip embedding and verification
    pub ecc: Option<&'a dyn EccCodec>,
    /// Polling budget
    pub timeouts: &'a Timeouts,
}

impl OpContext<'_> {
    /// Number of OOB bytes the codec occupies, 0 without ECC
    fn ecc_len(&self) -> Result<usize> {
        match self.ecc {
            None => Ok(0),
            Some(codec) => codec
                .ecc_len(self.geometry.page_size)
                .filter(|&len| len <= self.geometry.oob_size)
                .ok_or(Error::Io(IoFailure::InvalidArgument)),
        }
    }
}

/// A command sequence in progress on the bus
///
/// Tracks the current [`Phase`] and guarantees the chip is reset when the
/// sequence fails after a command was issued.
struct Sequence<'b, B: ?Sized> {
    bus: &'b mut B,
    op: &'static str,
    phase: Phase,
}

impl<'b, B: NandBus + ?Sized> Sequence<'b, B> {
    fn start(bus: &'b mut B, op: &'static str) -> Self {
        Self {
            bus,
            op,
            phase: Phase::Idle,
        }
    }

    fn enter(&mut self, next: Phase) {
        if self.phase != next {
            log::trace!("{}: {:?} -> {:?}", self.op, self.phase, next);
            self.phase = next;
        }
    }

    fn command(&mut self, code: u8) {
        self.bus.send_command(code);
        self.enter(Phase::CommandIssued);
    }

    /// Column-low, column-high, then the row bytes
    fn page_address(&mut self, column: u16, row: u32, row_cycles: u8) {
        let [col_lo, col_hi] = column.to_le_bytes();
        self.bus.send_address(col_lo);
        self.bus.send_address(col_hi);
        self.row_address(row, row_cycles);
    }

    fn row_address(&mut self, row: u32, row_cycles: u8) {
        for byte in row.to_le_bytes().iter().take(row_cycles as usize) {
            self.bus.send_address(*byte);
        }
        self.enter(Phase::AddressLoaded);
    }

    fn wait(&mut self, timeouts: &Timeouts) -> Result<()> {
        self.enter(Phase::Busy);
        if let Err(e) = wait_ready(&mut *self.bus, timeouts) {
            log::error!("{}: chip did not become ready", self.op);
            self.fail(timeouts);
            return Err(e);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) {
        self.enter(Phase::Transfer);
        self.bus.read_bytes(buf);
    }

    fn write(&mut self, bytes: &[u8]) {
        self.enter(Phase::Transfer);
        self.bus.write_bytes(bytes);
    }

    /// Read the status register and decode it for `kind`
    fn check(&mut self, kind: OperationKind, timeouts: &Timeouts, failure: IoFailure) -> Result<()> {
        let raw = match status::read_status(&mut *self.bus, timeouts) {
            Ok(raw) => raw,
            Err(e) => {
                self.fail(timeouts);
                return Err(e);
            }
        };

        if status::decode(raw, kind) {
            self.enter(Phase::Complete);
            Ok(())
        } else {
            log::error!("{}: {} (status 0x{:02X})", self.op, failure, raw);
            self.fail(timeouts);
            Err(failure.into())
        }
    }

    fn complete(&mut self) {
        self.enter(Phase::Complete);
    }

    fn fail(&mut self, timeouts: &Timeouts) {
        self.enter(Phase::Error);
        reset(&mut *self.bus, timeouts);
    }
}

/// Wait for the ready/busy line to report ready
///
/// First gives the chip up to `busy_edge_polls` samples to drop the line
/// (it may already be done), then polls for ready for at most
/// `ready_polls` samples.
pub fn wait_ready<B: NandBus + ?Sized>(bus: &mut B, timeouts: &Timeouts) -> Result<()> {
    for _ in 0..timeouts.busy_edge_polls {
        if !bus.is_ready() {
            break;
        }
    }

    for _ in 0..timeouts.ready_polls {
        if bus.is_ready() {
            return Ok(());
        }
        if timeouts.poll_delay_us > 0 {
            bus.delay_us(timeouts.poll_delay_us);
        }
    }

    Err(IoFailure::Timeout.into())
}

/// Reset the chip and wait for it to settle
pub fn reset<B: NandBus + ?Sized>(bus: &mut B, timeouts: &Timeouts) {
    log::debug!("resetting NAND chip");
    bus.send_command(opcodes::RESET);
    bus.delay_us(timeouts.reset_delay_us);
}

/// Read the two identification bytes (manufacturer, device)
pub fn read_id<B: NandBus + ?Sized>(bus: &mut B) -> [u8; 2] {
    bus.send_command(opcodes::READID);
    bus.send_address(0x00);

    let mut id = [0u8; 2];
    bus.read_bytes(&mut id);
    id
}

/// A page-sized OOB scratch buffer in the erased state
fn oob_buffer(len: usize) -> Result<heapless::Vec<u8, MAX_OOB_SIZE>> {
    let mut oob = heapless::Vec::new();
    oob.resize(len, 0xFF)
        .map_err(|_| Error::Io(IoFailure::InvalidArgument))?;
    Ok(oob)
}

/// Read a page
///
/// - With a `data` buffer (exactly one page long) the whole page and its
///   OOB area are transferred, the data is verified against the ECC bytes
///   of the OOB, and the first `spare.len()` OOB bytes are copied into
///   `spare` if given. An ECC mismatch still delivers the data and
///   returns [`PageStatus::EccMismatch`].
/// - With only a `spare` buffer the read starts at the OOB column and
///   transfers `spare.len()` bytes; no ECC check is done.
pub fn read_page<B: NandBus + ?Sized>(
    bus: &mut B,
    ctx: OpContext<'_>,
    page: u32,
    data: Option<&mut [u8]>,
    spare: Option<&mut [u8]>,
) -> Result<PageStatus> {
    let g = ctx.geometry;
    let addr = g.resolve_page(page)?;
    let row = g.row(&addr);

    match (data, spare) {
        (Some(data), spare) => {
            if data.len() != g.page_size || spare.as_ref().is_some_and(|s| s.len() > g.oob_size) {
                return Err(IoFailure::InvalidArgument.into());
            }
            let ecc_len = ctx.ecc_len()?;
            let mut oob = oob_buffer(g.oob_size)?;

            log::trace!("read_page: block {}, page {}", addr.block, addr.page);
            let mut seq = Sequence::start(bus, "read_page");
            seq.command(opcodes::READ0);
            seq.page_address(addr.column, row, g.row_cycles);
            seq.command(opcodes::READSTART);
            seq.wait(ctx.timeouts)?;
            seq.read(data);
            seq.read(&mut oob);

            let mut status = PageStatus::Ok;
            if let Some(codec) = ctx.ecc {
                if !codec.verify(data, &oob[g.oob_size - ecc_len..]) {
                    log::warn!("ECC error, block: {}, page: {}", addr.block, addr.page);
                    status = PageStatus::EccMismatch;
                }
            }

            if let Some(spare) = spare {
                let len = spare.len();
                spare.copy_from_slice(&oob[..len]);
            }

            if status.is_ok() {
                seq.complete();
            } else {
                seq.enter(Phase::Error);
            }
            Ok(status)
        }
        (None, Some(spare)) => {
            if spare.is_empty() || spare.len() > g.oob_size {
                return Err(IoFailure::InvalidArgument.into());
            }

            // skip the data area, start at the OOB
            let addr = addr.with_column(g.page_size as u16);

            log::trace!("read_spare: block {}, page {}", addr.block, addr.page);
            let mut seq = Sequence::start(bus, "read_spare");
            seq.command(opcodes::READ0);
            seq.page_address(addr.column, row, g.row_cycles);
            seq.command(opcodes::READSTART);
            seq.wait(ctx.timeouts)?;
            seq.read(spare);
            seq.complete();
            Ok(PageStatus::Ok)
        }
        (None, None) => Err(IoFailure::InvalidArgument.into()),
    }
}

/// Program a page
///
/// `data` is mandatory and exactly one page long; a spare-only program is
/// rejected. The OOB area starts erased (0xFF), `spare` is merged into its
/// beginning, then the ECC of `data` is written into the ECC sub-range at
/// the end of the OOB, overriding any caller bytes there.
pub fn write_page<B: NandBus + ?Sized>(
    bus: &mut B,
    ctx: OpContext<'_>,
    page: u32,
    data: Option<&[u8]>,
    spare: Option<&[u8]>,
) -> Result<()> {
    let g = ctx.geometry;
    let addr = g.resolve_page(page)?;
    let row = g.row(&addr);

    let data = match data {
        Some(data) if data.len() == g.page_size => data,
        _ => return Err(IoFailure::InvalidArgument.into()),
    };

    let mut oob = oob_buffer(g.oob_size)?;
    if let Some(spare) = spare {
        if spare.len() > g.oob_size {
            return Err(IoFailure::InvalidArgument.into());
        }
        oob[..spare.len()].copy_from_slice(spare);
    }

    if let Some(codec) = ctx.ecc {
        let ecc_start = g.oob_size - ctx.ecc_len()?;
        codec.compute(data, &mut oob[ecc_start..]);
    }

    log::trace!("write_page: block {}, page {}", addr.block, addr.page);
    let mut seq = Sequence::start(bus, "write_page");
    seq.command(opcodes::SEQIN);
    seq.page_address(0, row, g.row_cycles);
    seq.write(data);
    seq.write(&oob);
    seq.command(opcodes::PAGEPROG);
    seq.wait(ctx.timeouts)?;
    seq.check(
        OperationKind::Program,
        ctx.timeouts,
        IoFailure::ProgramFailed { page: row },
    )
}

/// Erase a block
pub fn erase_block<B: NandBus + ?Sized>(bus: &mut B, ctx: OpContext<'_>, block: u32) -> Result<()> {
    let g = ctx.geometry;
    let block = g.resolve_block(block)?;

    log::trace!("erase_block: block {}", block);
    let mut seq = Sequence::start(bus, "erase_block");
    seq.command(opcodes::ERASE1);
    seq.row_address(g.block_row(block), g.row_cycles);
    seq.command(opcodes::ERASE2);
    seq.wait(ctx.timeouts)?;
    seq.check(
        OperationKind::Erase,
        ctx.timeouts,
        IoFailure::EraseFailed { block },
    )
}

/// Copy a page to another page inside the chip
///
/// Data and OOB (including the stored ECC) move through the chip's page
/// register without crossing the bus.
pub fn copy_back<B: NandBus + ?Sized>(
    bus: &mut B,
    ctx: OpContext<'_>,
    src_page: u32,
    dst_page: u32,
) -> Result<()> {
    let g = ctx.geometry;
    let src = g.row(&g.resolve_page(src_page)?);
    let dst = g.row(&g.resolve_page(dst_page)?);

    log::trace!("copy_back: page {} -> page {}", src, dst);
    let mut seq = Sequence::start(bus, "copy_back");
    seq.command(opcodes::READ0);
    seq.page_address(0, src, g.row_cycles);
    seq.command(opcodes::READ_CB);
    seq.wait(ctx.timeouts)?;

    seq.command(opcodes::CB_PROG);
    seq.page_address(0, dst, g.row_cycles);
    seq.command(opcodes::PAGEPROG);
    seq.wait(ctx.timeouts)?;
    seq.check(
        OperationKind::Program,
        ctx.timeouts,
        IoFailure::CopyBackFailed { src, dst },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecc::Hamming256;

    /// Bus that records latch cycles and answers reads with a fixed byte
    struct ScriptedBus {
        commands: heapless::Vec<u8, 16>,
        addresses: heapless::Vec<u8, 16>,
        reads: usize,
        writes: usize,
        ready: bool,
        data: u8,
    }

    impl ScriptedBus {
        fn new(ready: bool, data: u8) -> Self {
            Self {
                commands: heapless::Vec::new(),
                addresses: heapless::Vec::new(),
                reads: 0,
                writes: 0,
                ready,
                data,
            }
        }
    }

    impl NandBus for ScriptedBus {
        fn send_command(&mut self, code: u8) {
            let _ = self.commands.push(code);
        }
        fn send_address(&mut self, byte: u8) {
            let _ = self.addresses.push(byte);
        }
        fn read_byte(&mut self) -> u8 {
            self.reads += 1;
            self.data
        }
        fn write_byte(&mut self, _value: u8) {
            self.writes += 1;
        }
        fn is_ready(&mut self) -> bool {
            self.ready
        }
        fn delay_us(&mut self, _us: u32) {}
    }

    const TIMEOUTS: Timeouts = Timeouts {
        busy_edge_polls: 4,
        ready_polls: 8,
        status_polls: 8,
        poll_delay_us: 0,
        reset_delay_us: 0,
    };

    fn ctx<'a>(geometry: &'a Geometry, ecc: Option<&'a dyn EccCodec>) -> OpContext<'a> {
        OpContext {
            geometry,
            ecc,
            timeouts: &TIMEOUTS,
        }
    }

    #[test]
    fn test_read_id_sequence() {
        let mut bus = ScriptedBus::new(true, 0xAD);
        assert_eq!(read_id(&mut bus), [0xAD, 0xAD]);
        assert_eq!(&bus.commands[..], &[opcodes::READID]);
        assert_eq!(&bus.addresses[..], &[0x00]);
        assert_eq!(bus.reads, 2);
    }

    #[test]
    fn test_page_address_byte_order() {
        let g = Geometry::hy27uf081g(2, 511);
        let mut bus = ScriptedBus::new(true, 0xFF);
        let mut spare = [0u8; 4];
        // partition page 0x45 -> absolute row 2 * 64 + 0x45 = 0xC5
        let status = read_page(&mut bus, ctx(&g, None), 0x45, None, Some(&mut spare)).unwrap();
        assert_eq!(status, PageStatus::Ok);
        assert_eq!(&bus.commands[..], &[opcodes::READ0, opcodes::READSTART]);
        // column 2048 = 0x0800, row 0x00C5
        assert_eq!(&bus.addresses[..], &[0x00, 0x08, 0xC5, 0x00]);
        assert_eq!(bus.reads, 4);
    }

    #[test]
    fn test_erase_sends_row_only() {
        let g = Geometry::hy27uf081g(0, 511);
        let mut bus = ScriptedBus::new(true, 0xE0);
        erase_block(&mut bus, ctx(&g, None), 5).unwrap();
        assert_eq!(
            &bus.commands[..],
            &[opcodes::ERASE1, opcodes::ERASE2, opcodes::STATUS]
        );
        // 5 * 64 = 0x140
        assert_eq!(&bus.addresses[..], &[0x40, 0x01]);
    }

    #[test]
    fn test_out_of_range_touches_nothing() {
        let g = Geometry::hy27uf081g(0, 9);
        let mut bus = ScriptedBus::new(true, 0xE0);
        let data = [0u8; 2048];
        assert!(matches!(
            write_page(&mut bus, ctx(&g, None), 10 * 64, Some(&data), None),
            Err(Error::OutOfRange { block: 10, .. })
        ));
        assert!(matches!(
            erase_block(&mut bus, ctx(&g, None), 10),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            copy_back(&mut bus, ctx(&g, None), 0, 10 * 64),
            Err(Error::OutOfRange { .. })
        ));
        assert!(bus.commands.is_empty());
        assert!(bus.addresses.is_empty());
    }

    #[test]
    fn test_write_without_data_is_rejected() {
        let g = Geometry::hy27uf081g(0, 9);
        let mut bus = ScriptedBus::new(true, 0xE0);
        let spare = [0u8; 8];
        assert_eq!(
            write_page(&mut bus, ctx(&g, None), 0, None, Some(&spare)),
            Err(Error::Io(IoFailure::InvalidArgument))
        );
        assert!(bus.commands.is_empty());
    }

    #[test]
    fn test_timeout_resets_chip() {
        let g = Geometry::hy27uf081g(0, 9);
        let mut bus = ScriptedBus::new(false, 0xE0);
        assert_eq!(
            erase_block(&mut bus, ctx(&g, None), 0),
            Err(Error::Io(IoFailure::Timeout))
        );
        assert_eq!(bus.commands.last(), Some(&opcodes::RESET));
    }

    #[test]
    fn test_status_never_idle_resets_chip() {
        let g = Geometry::hy27uf081g(0, 9);
        // ready line high, but status bits 5 and 6 never come up
        let mut bus = ScriptedBus::new(true, 0x80);
        assert_eq!(
            erase_block(&mut bus, ctx(&g, None), 2),
            Err(Error::Io(IoFailure::Timeout))
        );
        assert_eq!(
            &bus.commands[..],
            &[
                opcodes::ERASE1,
                opcodes::ERASE2,
                opcodes::STATUS,
                opcodes::RESET
            ]
        );
        assert_eq!(bus.reads, TIMEOUTS.status_polls as usize);

        let data = [0u8; 2048];
        let mut bus = ScriptedBus::new(true, 0x80);
        assert_eq!(
            write_page(&mut bus, ctx(&g, None), 0, Some(&data), None),
            Err(Error::Io(IoFailure::Timeout))
        );
        assert_eq!(bus.commands.last(), Some(&opcodes::RESET));
    }

    #[test]
    fn test_program_failure_resets_chip() {
        let g = Geometry::hy27uf081g(0, 9);
        let codec = Hamming256;
        let mut bus = ScriptedBus::new(true, 0xE1);
        let data = [0x5Au8; 2048];
        assert_eq!(
            write_page(&mut bus, ctx(&g, Some(&codec)), 3, Some(&data), None),
            Err(Error::Io(IoFailure::ProgramFailed { page: 3 }))
        );
        assert_eq!(
            &bus.commands[..],
            &[
                opcodes::SEQIN,
                opcodes::PAGEPROG,
                opcodes::STATUS,
                opcodes::RESET
            ]
        );
        assert_eq!(bus.writes, 2048 + 64);
    }

    #[test]
    fn test_erased_page_reads_clean() {
        let g = Geometry::hy27uf081g(0, 9);
        let codec = Hamming256;
        let mut bus = ScriptedBus::new(true, 0xFF);
        let mut data = [0u8; 2048];
        let mut spare = [0u8; 40];
        let status = read_page(
            &mut bus,
            ctx(&g, Some(&codec)),
            0,
            Some(&mut data),
            Some(&mut spare),
        )
        .unwrap();
        assert_eq!(status, PageStatus::Ok);
        assert!(data.iter().all(|&b| b == 0xFF));
        assert!(spare.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_read_rejects_short_buffer() {
        let g = Geometry::hy27uf081g(0, 9);
        let mut bus = ScriptedBus::new(true, 0xFF);
        let mut data = [0u8; 512];
        assert_eq!(
            read_page(&mut bus, ctx(&g, None), 0, Some(&mut data), None),
            Err(Error::Io(IoFailure::InvalidArgument))
        );
        assert_eq!(
            read_page(&mut bus, ctx(&g, None), 0, None, None),
            Err(Error::Io(IoFailure::InvalidArgument))
        );
        assert!(bus.commands.is_empty());
    }
}
