//! Memory-mapped latch bus
//!
//! External memory controllers (EMC/FSMC style) map a NAND chip's command,
//! address and data latches to three byte-wide locations: writing the
//! command location raises CLE, writing the address location raises ALE and
//! accessing the data location is a plain data cycle. The ready/busy output
//! is wired to a GPIO input.

use core::ptr;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;

use super::NandBus;

/// Bus backed by memory-mapped latch registers
pub struct LatchBus<P, D> {
    command: *mut u8,
    address: *mut u8,
    data: *mut u8,
    ready_pin: P,
    delay: D,
}

impl<P: InputPin, D: DelayNs> LatchBus<P, D> {
    /// Create a bus from the three latch addresses
    ///
    /// # Safety
    ///
    /// `command`, `address` and `data` must be the chip's latch locations as
    /// mapped by an already configured memory controller, valid for volatile
    /// byte access for the lifetime of the returned bus, and not accessed by
    /// anything else while it exists.
    pub unsafe fn new(
        command: usize,
        address: usize,
        data: usize,
        ready_pin: P,
        delay: D,
    ) -> Self {
        Self {
            command: command as *mut u8,
            address: address as *mut u8,
            data: data as *mut u8,
            ready_pin,
            delay,
        }
    }

    /// Release the ready pin and delay provider
    pub fn release(self) -> (P, D) {
        (self.ready_pin, self.delay)
    }
}

impl<P: InputPin, D: DelayNs> NandBus for LatchBus<P, D> {
    fn send_command(&mut self, code: u8) {
        // SAFETY: validity of the latch location is guaranteed by `new`
        unsafe { ptr::write_volatile(self.command, code) }
    }

    fn send_address(&mut self, byte: u8) {
        // SAFETY: validity of the latch location is guaranteed by `new`
        unsafe { ptr::write_volatile(self.address, byte) }
    }

    fn read_byte(&mut self) -> u8 {
        // SAFETY: validity of the latch location is guaranteed by `new`
        unsafe { ptr::read_volatile(self.data) }
    }

    fn write_byte(&mut self, value: u8) {
        // SAFETY: validity of the latch location is guaranteed by `new`
        unsafe { ptr::write_volatile(self.data, value) }
    }

    fn is_ready(&mut self) -> bool {
        // A pin read error counts as busy; bounded polling turns a
        // persistent error into a timeout.
        match self.ready_pin.is_high() {
            Ok(high) => high,
            Err(_) => {
                log::trace!("ready/busy pin read failed");
                false
            }
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
