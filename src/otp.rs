//! Word and range access to the OTP controller.

use crate::regs::{ControllerPort, Power, Status};

/// Offset into OTP address space, in 16-bit words.
pub type OtpAddress = u16;

/// The unit of OTP storage and of every controller transaction.
pub type OtpWord = u16;

/// Bytes per OTP word.
pub const WORD_BYTES: usize = 2;

/// OTP access error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OtpError {
    /// Address is outside every region the operation may touch.
    InvalidAddress,
    /// Byte length is not a whole number of words.
    InvalidLength,
    /// Controller is still powering down.
    ControllerBusy,
    /// Controller reported a read error.
    ReadFailed,
    /// Controller reported a write error, or the written value did not verify.
    WriteFailed,
    /// A status poll ran out of budget.
    ControllerTimeout,
}

impl core::fmt::Display for OtpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::InvalidAddress => "address not permitted",
            Self::InvalidLength => "length is not a multiple of the word size",
            Self::ControllerBusy => "controller busy powering down",
            Self::ReadFailed => "read failed",
            Self::WriteFailed => "write failed",
            Self::ControllerTimeout => "controller did not respond",
        };
        f.write_str(msg)
    }
}

/// Iterations allowed for each status poll before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollBudget(u32);

impl PollBudget {
    pub const DEFAULT: Self = Self(1_000_000);

    /// Creates a new [`PollBudget`]. A budget of zero fails every poll.
    pub const fn new(iterations: u32) -> Self {
        Self(iterations)
    }

    pub const fn iterations(self) -> u32 {
        self.0
    }
}

impl Default for PollBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// OTP controller driver.
///
/// Every method assumes exclusive use of the controller. Callers bracket
/// word and range access between [`Controller::power_on`] and
/// [`Controller::power_off`].
pub struct Controller<P> {
    port: P,
    budget: PollBudget,
}

impl<P: ControllerPort> Controller<P> {
    /// Creates a new [`Controller`] with the default poll budget.
    pub fn new(port: P) -> Self {
        Self::with_budget(port, PollBudget::DEFAULT)
    }

    pub fn with_budget(port: P, budget: PollBudget) -> Self {
        Self { port, budget }
    }

    pub fn budget(&self) -> PollBudget {
        self.budget
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Releases the underlying port.
    pub fn free(self) -> P {
        self.port
    }

    /// Power up the OTP macro and its access clock.
    ///
    /// Fails if the controller is not ready and a power-down is still in
    /// progress.
    pub fn power_on(&mut self) -> Result<(), OtpError> {
        if !self.port.ready() && self.port.power().contains(Power::PWR) {
            warn!("OTP power-on refused, power-down in progress");
            return Err(OtpError::ControllerBusy);
        }

        // macro power first, then the access clock
        self.port.set_power(Power::PWR);
        self.port.set_power(Power::PWR | Power::ACCL);
        debug!("OTP powered on");
        Ok(())
    }

    /// Power down the OTP macro and wait for the ready flag to drop.
    pub fn power_off(&mut self) -> Result<(), OtpError> {
        self.port.set_power(Power::ACCL);
        self.port.set_power(Power::empty());
        self.poll("power-down", |port| !port.ready())?;
        debug!("OTP powered off");
        Ok(())
    }

    /// Program one word.
    pub fn write_word(
        &mut self,
        address: OtpAddress,
        value: OtpWord,
    ) -> Result<(), OtpError> {
        self.poll("ready", |port| port.ready())?;
        self.port.set_power(Power::PWR | Power::ACCL);

        self.port.set_write_address(address);
        self.port.set_write_data(value);
        self.port.start_write();

        // command accepted
        self.poll("write start", |port| !port.write_pending())?;
        // command complete
        self.poll("write completion", |port| port.ready())?;

        let status = self.port.status();
        let mut result = Ok(());

        if status.intersects(Status::ERR_WR | Status::ERR_WP) {
            error!("OTP write error at {:#x}: {:#x}", address, status.bits());
            result = Err(OtpError::WriteFailed);
        }

        if status.contains(Status::ERR_RDY_WR) {
            error!("OTP write issued while not ready at {:#x}", address);
            self.port.clear_status(Status::ERR_RDY_WR);
            result = Err(OtpError::WriteFailed);
        }

        trace!("OTP write {:#x} <- {:#x}", address, value);
        result
    }

    /// Read one word.
    pub fn read_word(
        &mut self,
        address: OtpAddress,
    ) -> Result<OtpWord, OtpError> {
        self.poll("ready", |port| port.ready())?;
        self.port.set_power(Power::PWR | Power::ACCL);

        self.port.set_read_address(address);
        let value = self.port.read_data();

        self.poll("read completion", |port| port.ready())?;

        let status = self.port.status();
        let mut result = Ok(value);

        if status.contains(Status::ERR_RP) {
            error!("OTP read error at {:#x}", address);
            result = Err(OtpError::ReadFailed);
        }

        if status.contains(Status::ERR_RDY_RD) {
            error!("OTP read issued while not ready at {:#x}", address);
            self.port.clear_status(Status::ERR_RDY_RD);
            result = Err(OtpError::ReadFailed);
        }

        trace!("OTP read {:#x} -> {:#x}", address, value);
        result
    }

    /// Program consecutive words starting at `address`.
    ///
    /// Each byte pair is one little-endian word. Stops at the first failing
    /// word; words already programmed stay programmed.
    pub fn write_range(
        &mut self,
        address: OtpAddress,
        bytes: &[u8],
    ) -> Result<(), OtpError> {
        check_range(address, bytes.len())?;

        for (offset, chunk) in bytes.chunks_exact(WORD_BYTES).enumerate() {
            let value = u16::from_le_bytes([chunk[0], chunk[1]]);
            self.write_word(address.wrapping_add(offset as u16), value)?;
        }

        Ok(())
    }

    /// Read consecutive words starting at `address` into `out`.
    ///
    /// On error `out` holds whatever was read before the failing word.
    pub fn read_range(
        &mut self,
        address: OtpAddress,
        out: &mut [u8],
    ) -> Result<(), OtpError> {
        check_range(address, out.len())?;

        for (offset, chunk) in out.chunks_exact_mut(WORD_BYTES).enumerate() {
            let value = self.read_word(address.wrapping_add(offset as u16))?;
            chunk.copy_from_slice(&value.to_le_bytes());
        }

        Ok(())
    }

    fn poll(
        &mut self,
        what: &'static str,
        mut done: impl FnMut(&mut P) -> bool,
    ) -> Result<(), OtpError> {
        for _ in 0..self.budget.iterations() {
            if done(&mut self.port) {
                return Ok(());
            }
            core::hint::spin_loop();
        }

        error!("OTP timed out waiting for {}", what);
        Err(OtpError::ControllerTimeout)
    }
}

/// Check that `len` bytes form whole words that fit in address space.
fn check_range(address: OtpAddress, len: usize) -> Result<(), OtpError> {
    if len % WORD_BYTES != 0 {
        return Err(OtpError::InvalidLength);
    }

    let words = len / WORD_BYTES;
    if words == 0 {
        return Ok(());
    }

    u16::try_from(words - 1)
        .ok()
        .and_then(|last| address.checked_add(last))
        .map(|_| ())
        .ok_or(OtpError::InvalidAddress)
}
