//! Validated OTP commands.
//!
//! Every command that touches the controller powers it on, does its work and
//! powers it off again, on every path that got past power-on. Requests the
//! address policy rejects fail before the controller is powered.

use crate::{
    ident::UniqueId,
    map::{AddressMap, Intent, SCI_USB_BOOT, UNIQUE_ID},
    otp::{Controller, OtpAddress, OtpError, OtpWord},
    regs::ControllerPort,
};
use zerocopy::{AsBytes, FromZeroes};

const SCI_USB_BOOT_DISABLE_SHIFT: u16 = 1;

/// Command result error, as reported back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CmdError {
    /// Address or argument rejected. The controller was not accessed.
    DataInvalid,
    /// Reading failed.
    ReadFailed,
    /// Writing failed or the written value did not verify.
    WriteFailed,
    /// The controller stopped responding.
    ControllerTimeout,
}

impl CmdError {
    /// Result code sent back to the host. Success is 0.
    pub const fn code(self) -> u8 {
        match self {
            Self::DataInvalid => 1,
            Self::ReadFailed => 2,
            Self::WriteFailed => 3,
            Self::ControllerTimeout => 4,
        }
    }

    /// Map a controller error raised while reading.
    pub(crate) fn read(err: OtpError) -> Self {
        match err {
            OtpError::ControllerTimeout => Self::ControllerTimeout,
            _ => Self::ReadFailed,
        }
    }

    /// Map a controller error raised while writing.
    pub(crate) fn write(err: OtpError) -> Self {
        match err {
            OtpError::ControllerTimeout => Self::ControllerTimeout,
            _ => Self::WriteFailed,
        }
    }
}

impl core::fmt::Display for CmdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::DataInvalid => "invalid data",
            Self::ReadFailed => "read failed",
            Self::WriteFailed => "write failed",
            Self::ControllerTimeout => "controller timeout",
        };
        f.write_str(msg)
    }
}

/// OTP provisioning commands over a [`Controller`].
pub struct Provisioner<P> {
    otp: Controller<P>,
    map: AddressMap,
}

impl<P: ControllerPort> Provisioner<P> {
    /// Creates a new [`Provisioner`] using [`AddressMap::DEFAULT`].
    pub fn new(otp: Controller<P>) -> Self {
        Self::with_map(otp, AddressMap::DEFAULT)
    }

    pub fn with_map(otp: Controller<P>, map: AddressMap) -> Self {
        Self { otp, map }
    }

    pub fn map(&self) -> &AddressMap {
        &self.map
    }

    pub fn controller(&self) -> &Controller<P> {
        &self.otp
    }

    pub fn controller_mut(&mut self) -> &mut Controller<P> {
        &mut self.otp
    }

    pub fn release(self) -> Controller<P> {
        self.otp
    }

    /// Program one word and verify it.
    ///
    /// Word-locked regions tolerate bits programmed by earlier writes; all
    /// others must read back exactly `data`.
    pub fn write(
        &mut self,
        address: OtpAddress,
        data: OtpWord,
    ) -> Result<(), CmdError> {
        let region = self.map.classify(address, Intent::Write).map_err(|_| {
            warn!("OTP write to {:#x} refused", address);
            CmdError::DataInvalid
        })?;
        let lock = region.write_lock();

        self.bracket(CmdError::write, |otp| {
            otp.write_word(address, data).map_err(CmdError::write)?;
            let read_back = otp.read_word(address).map_err(CmdError::write)?;

            if lock.verify(data, read_back) {
                info!("OTP {:#x} programmed with {:#x}", address, data);
                Ok(())
            } else {
                warn!(
                    "OTP {:#x} verify failed: wrote {:#x}, read {:#x}",
                    address, data, read_back
                );
                Err(CmdError::WriteFailed)
            }
        })
    }

    /// Read one word.
    pub fn read(&mut self, address: OtpAddress) -> Result<OtpWord, CmdError> {
        self.map.classify(address, Intent::Read).map_err(|_| {
            warn!("OTP read of {:#x} refused", address);
            CmdError::DataInvalid
        })?;

        self.bracket(CmdError::read, |otp| {
            otp.read_word(address).map_err(CmdError::read)
        })
    }

    /// Read the 16-byte unique device ID.
    pub fn read_unique_id(&mut self) -> Result<UniqueId, CmdError> {
        self.bracket(CmdError::read, |otp| {
            let mut id = UniqueId::new_zeroed();
            otp.read_range(UNIQUE_ID, id.as_bytes_mut())
                .map_err(CmdError::read)?;
            Ok(id)
        })
    }

    /// Disable SCI/USB boot.
    ///
    /// The setting can only move towards disabled, so a request to enable is
    /// accepted without touching the controller. Disabling an already
    /// disabled device succeeds without writing.
    pub fn set_sci_usb_boot(&mut self, disable: bool) -> Result<(), CmdError> {
        if !disable {
            debug!("SCI/USB boot enable requested, nothing to program");
            return Ok(());
        }

        let requested: OtpWord = 1 << SCI_USB_BOOT_DISABLE_SHIFT;

        self.bracket(CmdError::write, |otp| {
            let current = otp.read_word(SCI_USB_BOOT).map_err(CmdError::read)?;
            if requested <= current {
                debug!("SCI/USB boot already disabled ({:#x})", current);
                return Ok(());
            }

            otp.write_word(SCI_USB_BOOT, requested)
                .map_err(CmdError::write)?;

            let current = otp.read_word(SCI_USB_BOOT).map_err(CmdError::write)?;
            if current < requested {
                warn!("SCI/USB boot setting did not take ({:#x})", current);
                return Err(CmdError::WriteFailed);
            }

            info!("SCI/USB boot disabled");
            Ok(())
        })
    }

    /// Whether SCI/USB boot is disabled.
    pub fn sci_usb_boot(&mut self) -> Result<bool, CmdError> {
        self.bracket(CmdError::read, |otp| {
            let current = otp.read_word(SCI_USB_BOOT).map_err(CmdError::read)?;
            Ok((current >> SCI_USB_BOOT_DISABLE_SHIFT) & 1 == 1)
        })
    }

    /// Run `f` with the controller powered.
    ///
    /// A power-on failure is mapped with `on_fail` and `f` does not run.
    /// Otherwise the controller is powered off whatever `f` returns; the
    /// error from `f` takes precedence over a power-off failure.
    pub(crate) fn bracket<T>(
        &mut self,
        on_fail: fn(OtpError) -> CmdError,
        f: impl FnOnce(&mut Controller<P>) -> Result<T, CmdError>,
    ) -> Result<T, CmdError> {
        self.otp.power_on().map_err(on_fail)?;

        let result = f(&mut self.otp);
        let off = self.otp.power_off().map_err(on_fail);

        let value = result?;
        off?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::PollBudget;
    use crate::sim::SimPort;

    fn provisioner() -> Provisioner<SimPort> {
        let otp = Controller::with_budget(SimPort::new(), PollBudget::new(64));
        Provisioner::with_map(otp, AddressMap::RZN2L)
    }

    fn sim(p: &Provisioner<SimPort>) -> &SimPort {
        p.controller().port()
    }

    fn assert_bracketed(p: &Provisioner<SimPort>, brackets: u32) {
        assert_eq!(sim(p).power_on_count(), brackets);
        assert_eq!(sim(p).power_off_count(), brackets);
        assert!(!sim(p).is_powered());
    }

    #[test]
    fn rejected_address_never_powers_on() {
        let mut p = provisioner();
        assert_eq!(p.write(0x0000, 1), Err(CmdError::DataInvalid));
        assert_eq!(p.write(0x01a7, 1), Err(CmdError::DataInvalid));
        assert_eq!(p.read(0x01d0), Err(CmdError::DataInvalid));
        assert_eq!(p.read(SCI_USB_BOOT), Err(CmdError::DataInvalid));
        assert_bracketed(&p, 0);
    }

    #[test]
    fn user_word_round_trip() {
        let mut p = provisioner();
        p.write(0x01c0, 0xbeef).unwrap();
        assert_eq!(p.read(0x01c0), Ok(0xbeef));
        assert_bracketed(&p, 2);
    }

    #[test]
    fn user_word_with_stale_bits_fails_verify() {
        let mut p = provisioner();
        p.controller_mut().port_mut().poke(0x01c0, 0xff00);
        assert_eq!(p.write(0x01c0, 0x0f00), Err(CmdError::WriteFailed));
        assert_bracketed(&p, 1);
    }

    #[test]
    fn counter_tolerates_earlier_bits() {
        let mut p = provisioner();
        p.controller_mut().port_mut().poke(0x0160, 0xff00);
        assert_eq!(p.write(0x0160, 0x0f00), Ok(()));
        assert_eq!(p.read(0x0160), Ok(0xff00));
    }

    #[test]
    fn write_error_powers_off() {
        let mut p = provisioner();
        p.controller_mut().port_mut().fail_next_write();
        assert_eq!(p.write(0x0160, 1), Err(CmdError::WriteFailed));
        assert_bracketed(&p, 1);
    }

    #[test]
    fn verify_read_error_is_a_write_failure() {
        let mut p = provisioner();
        p.controller_mut().port_mut().fail_next_read();
        assert_eq!(p.write(0x0160, 1), Err(CmdError::WriteFailed));
        assert_bracketed(&p, 1);
    }

    #[test]
    fn busy_controller_fails_without_bracket() {
        let mut p = provisioner();
        p.controller_mut().port_mut().set_powering_down(true);
        assert_eq!(p.write(0x0160, 1), Err(CmdError::WriteFailed));
        assert_eq!(p.read(0x0160), Err(CmdError::ReadFailed));
        assert_eq!(p.read_unique_id(), Err(CmdError::ReadFailed));
        assert_bracketed(&p, 0);
    }

    #[test]
    fn timeout_is_reported_as_timeout() {
        let mut p = provisioner();
        p.controller_mut().port_mut().set_stuck_start(true);
        assert_eq!(p.write(0x0160, 1), Err(CmdError::ControllerTimeout));
        assert_bracketed(&p, 1);
    }

    #[test]
    fn power_off_timeout_surfaces() {
        let mut p = provisioner();
        p.controller_mut().port_mut().set_stuck_ready(true);
        assert_eq!(p.read(0x0160), Err(CmdError::ControllerTimeout));
    }

    #[test]
    fn unique_id() {
        let mut p = provisioner();
        for (i, address) in (UNIQUE_ID..UNIQUE_ID + 8).enumerate() {
            let lo = (2 * i) as u16;
            p.controller_mut()
                .port_mut()
                .poke(address, ((lo + 1) << 8) | lo);
        }

        let id = p.read_unique_id().unwrap();
        let expected: [u8; 16] = core::array::from_fn(|i| i as u8);
        assert_eq!(id.to_bytes(), expected);
        assert_bracketed(&p, 1);
    }

    #[test]
    fn unique_id_read_failure() {
        let mut p = provisioner();
        p.controller_mut().port_mut().fail_read_at(UNIQUE_ID + 3);
        assert_eq!(p.read_unique_id(), Err(CmdError::ReadFailed));
        assert_bracketed(&p, 1);
    }

    #[test]
    fn sci_usb_boot_enable_is_a_no_op() {
        let mut p = provisioner();
        assert_eq!(p.set_sci_usb_boot(false), Ok(()));
        assert_bracketed(&p, 0);
        assert_eq!(sim(&p).write_count(), 0);
    }

    #[test]
    fn sci_usb_boot_disable() {
        let mut p = provisioner();
        assert_eq!(p.sci_usb_boot(), Ok(false));

        p.set_sci_usb_boot(true).unwrap();
        assert_eq!(sim(&p).peek(SCI_USB_BOOT), 0b10);
        assert_eq!(p.sci_usb_boot(), Ok(true));
        assert_bracketed(&p, 3);
    }

    #[test]
    fn sci_usb_boot_already_disabled_does_not_write() {
        let mut p = provisioner();
        p.controller_mut().port_mut().poke(SCI_USB_BOOT, 0b110);

        p.set_sci_usb_boot(true).unwrap();
        assert_eq!(sim(&p).write_count(), 0);
        assert_eq!(sim(&p).peek(SCI_USB_BOOT), 0b110);
        assert_bracketed(&p, 1);
    }

    #[test]
    fn sci_usb_boot_write_not_taking_fails() {
        let mut p = provisioner();
        p.controller_mut().port_mut().lock_word(SCI_USB_BOOT);
        assert_eq!(p.set_sci_usb_boot(true), Err(CmdError::WriteFailed));
        assert_bracketed(&p, 1);
    }

    #[test]
    fn sci_usb_boot_initial_read_failure() {
        let mut p = provisioner();
        p.controller_mut().port_mut().fail_next_read();
        assert_eq!(p.set_sci_usb_boot(true), Err(CmdError::ReadFailed));
        assert_eq!(sim(&p).write_count(), 0);
        assert_bracketed(&p, 1);
    }

    #[test]
    fn error_codes() {
        assert_eq!(CmdError::DataInvalid.code(), 1);
        assert_eq!(CmdError::ReadFailed.code(), 2);
        assert_eq!(CmdError::WriteFailed.code(), 3);
        assert_eq!(CmdError::ControllerTimeout.code(), 4);
    }
}
