//! OTP controller registers.
//!
//! [`ControllerPort`] is the seam between the engine and the hardware. [`Mmio`]
//! drives the real controller through its memory-mapped register block;
//! [`crate::sim::SimPort`] stands in for it on the host.

use bitflags::bitflags;
use vcell::VolatileCell;

bitflags! {
    /// OTP power control register (OTPPWR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Power: u32 {
        /// OTP macro power.
        const PWR = 1 << 0;
        /// Access clock enable.
        const ACCL = 1 << 1;
    }
}

bitflags! {
    /// OTP access status register (OTPSTR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Controller ready to accept a command.
        const CMD_RDY = 1 << 0;
        /// Programming error.
        const ERR_WR = 1 << 1;
        /// Write to a protected word.
        const ERR_WP = 1 << 2;
        /// Read from a protected word.
        const ERR_RP = 1 << 3;
        /// Write command issued while not ready. Cleared by software.
        const ERR_RDY_WR = 1 << 4;
        /// Read command issued while not ready. Cleared by software.
        const ERR_RDY_RD = 1 << 5;
    }
}

/// Access to the OTP controller's control, status and data registers.
pub trait ControllerPort {
    /// Read the power control register.
    fn power(&mut self) -> Power;

    /// Write the power control register.
    fn set_power(&mut self, power: Power);

    /// Read the access status register.
    fn status(&mut self) -> Status;

    /// Clear software-clearable status flags.
    fn clear_status(&mut self, flags: Status);

    fn set_write_address(&mut self, address: u16);

    fn set_write_data(&mut self, data: u16);

    /// Set the write start bit (OTPSTAWR.STAWR).
    fn start_write(&mut self);

    /// Whether the write start bit is still set.
    fn write_pending(&mut self) -> bool;

    /// Program the read address, which starts a read command.
    fn set_read_address(&mut self, address: u16);

    fn read_data(&mut self) -> u16;

    fn ready(&mut self) -> bool {
        self.status().contains(Status::CMD_RDY)
    }
}

/// OTP controller register block.
#[repr(C)]
pub struct RegisterBlock {
    pub otppwr: VolatileCell<u32>,
    pub otpstr: VolatileCell<u32>,
    pub otpstawr: VolatileCell<u32>,
    pub otpadrwr: VolatileCell<u32>,
    pub otpdatawr: VolatileCell<u32>,
    pub otpadrrd: VolatileCell<u32>,
    pub otpdatard: VolatileCell<u32>,
}

impl RegisterBlock {
    /// Assert layout at compile time.
    const _SIZE: () = assert!(core::mem::size_of::<Self>() == 0x1c);
}

const STAWR: u32 = 1 << 0;
const ADDRESS_MASK: u32 = 0xffff;

/// Memory-mapped OTP controller.
pub struct Mmio {
    regs: &'static RegisterBlock,
}

impl Mmio {
    /// Creates a new [`Mmio`] port.
    ///
    /// # Safety
    ///
    /// `base` must be the address of the OTP controller register block, and
    /// no other handle to the block may be used while this one exists.
    pub unsafe fn new(base: usize) -> Self {
        Self {
            regs: &*(base as *const RegisterBlock),
        }
    }
}

// SAFETY: `Mmio` is the only handle to the register block, so moving it to
// another execution context moves sole ownership of the peripheral.
unsafe impl Send for Mmio {}

impl ControllerPort for Mmio {
    fn power(&mut self) -> Power {
        Power::from_bits_truncate(self.regs.otppwr.get())
    }

    fn set_power(&mut self, power: Power) {
        let other = self.regs.otppwr.get() & !Power::all().bits();
        self.regs.otppwr.set(other | power.bits());
    }

    fn status(&mut self) -> Status {
        Status::from_bits_truncate(self.regs.otpstr.get())
    }

    fn clear_status(&mut self, flags: Status) {
        let value = self.regs.otpstr.get();
        self.regs.otpstr.set(value & !flags.bits());
    }

    fn set_write_address(&mut self, address: u16) {
        self.regs.otpadrwr.set(u32::from(address) & ADDRESS_MASK);
    }

    fn set_write_data(&mut self, data: u16) {
        self.regs.otpdatawr.set(u32::from(data));
    }

    fn start_write(&mut self) {
        self.regs.otpstawr.set(STAWR);
    }

    fn write_pending(&mut self) -> bool {
        self.regs.otpstawr.get() & STAWR != 0
    }

    fn set_read_address(&mut self, address: u16) {
        self.regs.otpadrrd.set(u32::from(address) & ADDRESS_MASK);
    }

    fn read_data(&mut self) -> u16 {
        self.regs.otpdatard.get() as u16
    }
}
