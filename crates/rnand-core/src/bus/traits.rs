//! Bus trait definitions
//!
//! A raw NAND chip is driven through three latches sharing one 8-bit bus
//! (command, address, data) and a ready/busy output. The operation engine
//! only ever talks to the chip through [`NandBus`], so it can run against a
//! memory-mapped controller, a GPIO bitbang or an in-memory emulator.

/// Latch-level NAND bus
///
/// The primitives never fail: they are a mechanical abstraction of the bus
/// cycles. Sequencing, readiness and status interpretation are the job of
/// [`crate::nand::protocol`].
///
/// Address bytes are latched one at a time in the order the chip expects
/// them: column-low, column-high, row-low, row-high (and row-3 on chips
/// with three row cycles).
pub trait NandBus {
    /// Latch a command byte (CLE cycle)
    fn send_command(&mut self, code: u8);

    /// Latch a single address byte (ALE cycle)
    fn send_address(&mut self, byte: u8);

    /// Read one byte from the data latch
    fn read_byte(&mut self) -> u8;

    /// Write one byte to the data latch
    fn write_byte(&mut self, value: u8);

    /// Sample the ready/busy line (`true` when the chip is ready)
    fn is_ready(&mut self) -> bool;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Stream bytes out of the data latch
    ///
    /// Default implementation calls `read_byte` once per byte.
    fn read_bytes(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.read_byte();
        }
    }

    /// Stream bytes into the data latch
    ///
    /// Default implementation calls `write_byte` once per byte.
    fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_byte(byte);
        }
    }
}

impl<B: NandBus + ?Sized> NandBus for &mut B {
    fn send_command(&mut self, code: u8) {
        (**self).send_command(code)
    }

    fn send_address(&mut self, byte: u8) {
        (**self).send_address(byte)
    }

    fn read_byte(&mut self) -> u8 {
        (**self).read_byte()
    }

    fn write_byte(&mut self, value: u8) {
        (**self).write_byte(value)
    }

    fn is_ready(&mut self) -> bool {
        (**self).is_ready()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) {
        (**self).read_bytes(buf)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        (**self).write_bytes(bytes)
    }
}

// Blanket impl for boxed buses to allow trait objects
#[cfg(feature = "alloc")]
impl NandBus for alloc::boxed::Box<dyn NandBus + Send> {
    fn send_command(&mut self, code: u8) {
        (**self).send_command(code)
    }

    fn send_address(&mut self, byte: u8) {
        (**self).send_address(byte)
    }

    fn read_byte(&mut self) -> u8 {
        (**self).read_byte()
    }

    fn write_byte(&mut self, value: u8) {
        (**self).write_byte(value)
    }

    fn is_ready(&mut self) -> bool {
        (**self).is_ready()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) {
        (**self).read_bytes(buf)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        (**self).write_bytes(bytes)
    }
}

