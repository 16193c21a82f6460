//! Simulated OTP controller.
//!
//! [`SimPort`] keeps OTP contents in memory and follows the same register
//! protocol as the hardware: programming can only set bits, the ready flag
//! follows power, and error flags are reported through the status register.
//! Faults are scripted with the `fail_*`, `*_error_on_*` and `set_stuck_*`
//! methods, and power transitions are counted so callers can check that every
//! power-on is matched by a power-off.

use crate::otp::{OtpAddress, OtpWord};
use crate::regs::{ControllerPort, Power, Status};

/// Number of words the simulator backs. Addresses past this fault.
pub const SIM_WORDS: usize = 0x200;

#[derive(Debug, Clone)]
pub struct SimPort {
    cells: [OtpWord; SIM_WORDS],
    locked: [bool; SIM_WORDS],

    power: Power,
    flags: Status,
    write_address: OtpAddress,
    write_data: OtpWord,
    read_latch: OtpWord,
    write_pending: bool,

    stuck_busy: bool,
    stuck_ready: bool,
    stuck_start: bool,
    powering_down: bool,
    fail_write: bool,
    fail_read: bool,
    fail_read_at: Option<OtpAddress>,
    ready_error_write: bool,
    ready_error_read: bool,

    power_ons: u32,
    power_offs: u32,
    writes: u32,
    reads: u32,
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPort {
    /// Creates a new [`SimPort`] with every word erased and power off.
    pub const fn new() -> Self {
        Self {
            cells: [0; SIM_WORDS],
            locked: [false; SIM_WORDS],
            power: Power::empty(),
            flags: Status::empty(),
            write_address: 0,
            write_data: 0,
            read_latch: 0,
            write_pending: false,
            stuck_busy: false,
            stuck_ready: false,
            stuck_start: false,
            powering_down: false,
            fail_write: false,
            fail_read: false,
            fail_read_at: None,
            ready_error_write: false,
            ready_error_read: false,
            power_ons: 0,
            power_offs: 0,
            writes: 0,
            reads: 0,
        }
    }

    /// Current contents of a word, bypassing the controller.
    pub fn peek(&self, address: OtpAddress) -> OtpWord {
        self.cells.get(usize::from(address)).copied().unwrap_or(0)
    }

    /// Set a word directly, as if programmed before the test started.
    pub fn poke(&mut self, address: OtpAddress, value: OtpWord) {
        if let Some(cell) = self.cells.get_mut(usize::from(address)) {
            *cell = value;
        }
    }

    /// Write-protect a word. Writes to it raise `ERR_WP`.
    pub fn lock_word(&mut self, address: OtpAddress) {
        if let Some(locked) = self.locked.get_mut(usize::from(address)) {
            *locked = true;
        }
    }

    /// Raise `ERR_WR` on the next write command.
    pub fn fail_next_write(&mut self) {
        self.fail_write = true;
    }

    /// Raise `ERR_RP` on the next read command.
    pub fn fail_next_read(&mut self) {
        self.fail_read = true;
    }

    /// Raise `ERR_RP` on the next read of `address`.
    pub fn fail_read_at(&mut self, address: OtpAddress) {
        self.fail_read_at = Some(address);
    }

    /// Raise `ERR_RDY_WR` on the next write command.
    pub fn ready_error_on_next_write(&mut self) {
        self.ready_error_write = true;
    }

    /// Raise `ERR_RDY_RD` on the next read command.
    pub fn ready_error_on_next_read(&mut self) {
        self.ready_error_read = true;
    }

    /// Hold the ready flag low regardless of power.
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Hold the ready flag high after power is removed.
    pub fn set_stuck_ready(&mut self, stuck: bool) {
        self.stuck_ready = stuck;
    }

    /// Never self-clear the write start bit.
    pub fn set_stuck_start(&mut self, stuck: bool) {
        self.stuck_start = stuck;
    }

    /// Report a power-down in progress: `PWR` set and not ready.
    pub fn set_powering_down(&mut self, powering_down: bool) {
        self.powering_down = powering_down;
    }

    pub fn is_powered(&self) -> bool {
        self.power.contains(Power::PWR)
    }

    pub fn power_on_count(&self) -> u32 {
        self.power_ons
    }

    pub fn power_off_count(&self) -> u32 {
        self.power_offs
    }

    /// Write commands issued.
    pub fn write_count(&self) -> u32 {
        self.writes
    }

    /// Read commands issued.
    pub fn read_count(&self) -> u32 {
        self.reads
    }

    fn is_ready(&self) -> bool {
        if self.stuck_busy || self.powering_down {
            false
        } else if self.is_powered() {
            true
        } else {
            self.stuck_ready
        }
    }

    fn is_accessible(&self) -> bool {
        self.power.contains(Power::PWR | Power::ACCL)
    }
}

impl ControllerPort for SimPort {
    fn power(&mut self) -> Power {
        if self.powering_down {
            self.power | Power::PWR
        } else {
            self.power
        }
    }

    fn set_power(&mut self, power: Power) {
        let was_on = self.is_powered();
        let now_on = power.contains(Power::PWR);

        if !was_on && now_on {
            self.power_ons += 1;
        } else if was_on && !now_on {
            self.power_offs += 1;
        }

        self.power = power;
    }

    fn status(&mut self) -> Status {
        if self.is_ready() {
            self.flags | Status::CMD_RDY
        } else {
            self.flags
        }
    }

    fn clear_status(&mut self, flags: Status) {
        // only the ready errors are software-clearable
        self.flags
            .remove(flags & (Status::ERR_RDY_WR | Status::ERR_RDY_RD));
    }

    fn set_write_address(&mut self, address: u16) {
        self.write_address = address;
    }

    fn set_write_data(&mut self, data: u16) {
        self.write_data = data;
    }

    fn start_write(&mut self) {
        if self.stuck_start {
            self.write_pending = true;
            return;
        }

        self.writes += 1;
        self.flags.remove(Status::ERR_WR | Status::ERR_WP);

        if core::mem::take(&mut self.ready_error_write) {
            self.flags.insert(Status::ERR_RDY_WR);
        }

        let index = usize::from(self.write_address);
        if core::mem::take(&mut self.fail_write) || !self.is_accessible() {
            self.flags.insert(Status::ERR_WR);
        } else if index >= SIM_WORDS || self.locked[index] {
            self.flags.insert(Status::ERR_WP);
        } else {
            self.cells[index] |= self.write_data;
        }
    }

    fn write_pending(&mut self) -> bool {
        self.write_pending
    }

    fn set_read_address(&mut self, address: u16) {
        self.reads += 1;
        self.flags.remove(Status::ERR_RP);

        if core::mem::take(&mut self.ready_error_read) {
            self.flags.insert(Status::ERR_RDY_RD);
        }

        let targeted = self.fail_read_at == Some(address);
        if targeted {
            self.fail_read_at = None;
        }

        let index = usize::from(address);
        if core::mem::take(&mut self.fail_read)
            || targeted
            || !self.is_accessible()
            || index >= SIM_WORDS
        {
            self.flags.insert(Status::ERR_RP);
            self.read_latch = 0;
        } else {
            self.read_latch = self.cells[index];
        }
    }

    fn read_data(&mut self) -> u16 {
        self.read_latch
    }
}
