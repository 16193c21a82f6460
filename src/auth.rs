//! JTAG debug authentication.
//!
//! The authentication mode is a bitfield in OTP that can only gain bits, so the
//! level can only be raised: no authentication, level 1, level 2 and finally
//! permanent prohibition. Only plain (non-hashed) IDs are provisioned here.

use crate::{
    cmd::{CmdError, Provisioner},
    ident::AuthId,
    map::{IdSlot, JTAG_AUTH_MODE, JTAG_AUTH_TYPE},
    otp::OtpWord,
    regs::ControllerPort,
};
use zerocopy::AsBytes;

/// JTAG authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AuthMode {
    NoAuth = 0,
    Level1 = 1,
    Level2 = 2,
    PermanentProhibit = 4,
}

impl AuthMode {
    /// Decode a mode code received from the host.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::NoAuth),
            1 => Some(Self::Level1),
            2 => Some(Self::Level2),
            4 => Some(Self::PermanentProhibit),
            _ => None,
        }
    }

    /// OTP word value for this mode.
    pub const fn bits(self) -> OtpWord {
        self as OtpWord
    }

    /// Decode the stored mode word, highest level bit first.
    pub const fn from_word(word: OtpWord) -> Self {
        if word & Self::PermanentProhibit.bits() != 0 {
            Self::PermanentProhibit
        } else if word & Self::Level2.bits() != 0 {
            Self::Level2
        } else if word & Self::Level1.bits() != 0 {
            Self::Level1
        } else {
            Self::NoAuth
        }
    }

    /// Plain ID slot used by this mode.
    pub const fn plain_slot(self) -> Option<IdSlot> {
        match self {
            Self::Level1 => Some(IdSlot::Level1Plain),
            Self::Level2 => Some(IdSlot::Level2Plain),
            Self::NoAuth | Self::PermanentProhibit => None,
        }
    }
}

/// JTAG authentication ID type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AuthType {
    Plain = 0,
    Hash = 1,
}

impl AuthType {
    /// Decode a type code received from the host.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Plain),
            1 => Some(Self::Hash),
            _ => None,
        }
    }

    pub const fn from_word(word: OtpWord) -> Self {
        if word == Self::Hash as OtpWord {
            Self::Hash
        } else {
            Self::Plain
        }
    }
}

/// Stored JTAG authentication settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub auth_type: AuthType,
}

impl<P: ControllerPort> Provisioner<P> {
    /// Raise the JTAG authentication level.
    ///
    /// The stored type must be plain and the stored mode strictly lower than
    /// `mode`. Re-requesting the current level fails.
    pub fn set_jtag_auth(
        &mut self,
        mode: AuthMode,
        auth_type: AuthType,
    ) -> Result<(), CmdError> {
        if mode == AuthMode::NoAuth || auth_type != AuthType::Plain {
            warn!("JTAG auth {} / {} refused", mode, auth_type);
            return Err(CmdError::DataInvalid);
        }

        let requested = mode.bits();

        self.bracket(CmdError::write, |otp| {
            let current_type =
                otp.read_word(JTAG_AUTH_TYPE).map_err(CmdError::write)?;
            if current_type != AuthType::Plain as OtpWord {
                warn!("JTAG auth type is not plain ({:#x})", current_type);
                return Err(CmdError::WriteFailed);
            }

            let current =
                otp.read_word(JTAG_AUTH_MODE).map_err(CmdError::write)?;
            if current >= requested {
                warn!(
                    "JTAG auth {:#x} would not raise current {:#x}",
                    requested, current
                );
                return Err(CmdError::WriteFailed);
            }

            otp.write_word(JTAG_AUTH_MODE, requested)
                .map_err(CmdError::write)?;

            let current =
                otp.read_word(JTAG_AUTH_MODE).map_err(CmdError::write)?;
            if current < requested {
                warn!("JTAG auth setting did not take ({:#x})", current);
                return Err(CmdError::WriteFailed);
            }

            info!("JTAG auth raised to {}", mode);
            Ok(())
        })
    }

    /// Read the stored JTAG authentication settings.
    pub fn jtag_auth(&mut self) -> Result<AuthConfig, CmdError> {
        self.bracket(CmdError::read, |otp| {
            let mode = otp.read_word(JTAG_AUTH_MODE).map_err(CmdError::read)?;
            let auth_type =
                otp.read_word(JTAG_AUTH_TYPE).map_err(CmdError::read)?;

            Ok(AuthConfig {
                mode: AuthMode::from_word(mode),
                auth_type: AuthType::from_word(auth_type),
            })
        })
    }

    /// Program the plain ID for a level 1 or level 2 mode.
    ///
    /// The ID is not read back; success means the controller accepted every
    /// word.
    pub fn set_jtag_auth_id(
        &mut self,
        mode: AuthMode,
        auth_type: AuthType,
        id: &AuthId,
    ) -> Result<(), CmdError> {
        let slot = match (mode.plain_slot(), auth_type) {
            (Some(slot), AuthType::Plain) => slot,
            _ => {
                warn!("JTAG auth ID for {} / {} refused", mode, auth_type);
                return Err(CmdError::DataInvalid);
            }
        };

        self.bracket(CmdError::write, |otp| {
            otp.write_range(slot.address(), id.as_bytes())
                .map_err(CmdError::write)?;
            info!("JTAG auth ID programmed into {}", slot);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        map::AddressMap,
        otp::{Controller, PollBudget},
        sim::SimPort,
    };

    const MODES: [AuthMode; 3] = [
        AuthMode::Level1,
        AuthMode::Level2,
        AuthMode::PermanentProhibit,
    ];

    fn provisioner() -> Provisioner<SimPort> {
        let otp = Controller::with_budget(SimPort::new(), PollBudget::new(64));
        Provisioner::with_map(otp, AddressMap::RZT2M)
    }

    fn sim(p: &mut Provisioner<SimPort>) -> &mut SimPort {
        p.controller_mut().port_mut()
    }

    #[test]
    fn raw_codes() {
        assert_eq!(AuthMode::from_raw(4), Some(AuthMode::PermanentProhibit));
        assert_eq!(AuthMode::from_raw(3), None);
        assert_eq!(AuthType::from_raw(1), Some(AuthType::Hash));
        assert_eq!(AuthType::from_raw(2), None);
    }

    #[test]
    fn mode_decodes_highest_bit_first() {
        assert_eq!(AuthMode::from_word(0), AuthMode::NoAuth);
        assert_eq!(AuthMode::from_word(0b001), AuthMode::Level1);
        assert_eq!(AuthMode::from_word(0b011), AuthMode::Level2);
        assert_eq!(AuthMode::from_word(0b111), AuthMode::PermanentProhibit);
        assert_eq!(AuthMode::from_word(0b101), AuthMode::PermanentProhibit);
    }

    #[test]
    fn type_decodes() {
        assert_eq!(AuthType::from_word(0), AuthType::Plain);
        assert_eq!(AuthType::from_word(1), AuthType::Hash);
        assert_eq!(AuthType::from_word(2), AuthType::Plain);
    }

    #[test]
    fn escalates_one_level_at_a_time() {
        let mut p = provisioner();

        for mode in MODES {
            p.set_jtag_auth(mode, AuthType::Plain).unwrap();
            assert_eq!(p.jtag_auth().unwrap().mode, mode);
        }

        assert_eq!(sim(&mut p).peek(JTAG_AUTH_MODE), 0b111);
    }

    #[test]
    fn same_or_lower_level_rejected() {
        let mut p = provisioner();
        p.set_jtag_auth(AuthMode::Level2, AuthType::Plain).unwrap();

        let writes = sim(&mut p).write_count();
        assert_eq!(
            p.set_jtag_auth(AuthMode::Level2, AuthType::Plain),
            Err(CmdError::WriteFailed)
        );
        assert_eq!(
            p.set_jtag_auth(AuthMode::Level1, AuthType::Plain),
            Err(CmdError::WriteFailed)
        );
        assert_eq!(sim(&mut p).write_count(), writes);
    }

    #[test]
    fn prohibition_is_final() {
        let mut p = provisioner();
        p.set_jtag_auth(AuthMode::PermanentProhibit, AuthType::Plain)
            .unwrap();

        for mode in MODES {
            assert_eq!(
                p.set_jtag_auth(mode, AuthType::Plain),
                Err(CmdError::WriteFailed)
            );
        }
    }

    #[test]
    fn invalid_arguments_rejected_before_power() {
        let mut p = provisioner();
        assert_eq!(
            p.set_jtag_auth(AuthMode::NoAuth, AuthType::Plain),
            Err(CmdError::DataInvalid)
        );
        assert_eq!(
            p.set_jtag_auth(AuthMode::Level1, AuthType::Hash),
            Err(CmdError::DataInvalid)
        );

        let id = AuthId::new([0x5a; 16]);
        assert_eq!(
            p.set_jtag_auth_id(AuthMode::Level1, AuthType::Hash, &id),
            Err(CmdError::DataInvalid)
        );
        assert_eq!(
            p.set_jtag_auth_id(
                AuthMode::PermanentProhibit,
                AuthType::Plain,
                &id,
            ),
            Err(CmdError::DataInvalid)
        );
        assert_eq!(
            p.set_jtag_auth_id(AuthMode::NoAuth, AuthType::Plain, &id),
            Err(CmdError::DataInvalid)
        );

        assert_eq!(sim(&mut p).power_on_count(), 0);
    }

    #[test]
    fn hash_type_blocks_mode_change() {
        let mut p = provisioner();
        sim(&mut p).poke(JTAG_AUTH_TYPE, 1);

        assert_eq!(
            p.set_jtag_auth(AuthMode::Level1, AuthType::Plain),
            Err(CmdError::WriteFailed)
        );
        assert_eq!(sim(&mut p).peek(JTAG_AUTH_MODE), 0);
        assert_eq!(
            p.jtag_auth(),
            Ok(AuthConfig {
                mode: AuthMode::NoAuth,
                auth_type: AuthType::Hash,
            })
        );
        assert_eq!(sim(&mut p).power_on_count(), 2);
        assert_eq!(sim(&mut p).power_off_count(), 2);
    }

    #[test]
    fn mode_write_not_taking_fails() {
        let mut p = provisioner();
        sim(&mut p).lock_word(JTAG_AUTH_MODE);
        assert_eq!(
            p.set_jtag_auth(AuthMode::Level1, AuthType::Plain),
            Err(CmdError::WriteFailed)
        );
        assert!(!sim(&mut p).is_powered());
    }

    #[test]
    fn jtag_auth_read_failure() {
        let mut p = provisioner();
        sim(&mut p).fail_read_at(JTAG_AUTH_TYPE);
        assert_eq!(p.jtag_auth(), Err(CmdError::ReadFailed));
        assert_eq!(sim(&mut p).power_off_count(), 1);
    }

    #[test]
    fn auth_id_goes_to_level_slot() {
        let mut p = provisioner();
        let id = AuthId::new(core::array::from_fn(|i| i as u8));

        p.set_jtag_auth_id(AuthMode::Level2, AuthType::Plain, &id)
            .unwrap();

        assert_eq!(sim(&mut p).peek(0x009b), 0x0100);
        assert_eq!(sim(&mut p).peek(0x00a2), 0x0f0e);
        assert_eq!(sim(&mut p).peek(0x0093), 0);
        // written without verification
        assert_eq!(sim(&mut p).read_count(), 0);
        assert_eq!(sim(&mut p).power_off_count(), 1);
    }

    #[test]
    fn auth_id_write_failure_stops() {
        let mut p = provisioner();
        sim(&mut p).lock_word(0x0095);

        let id = AuthId::new([0xff; 16]);
        assert_eq!(
            p.set_jtag_auth_id(AuthMode::Level1, AuthType::Plain, &id),
            Err(CmdError::WriteFailed)
        );
        assert_eq!(sim(&mut p).peek(0x0094), 0xffff);
        assert_eq!(sim(&mut p).peek(0x0096), 0);
        assert!(!sim(&mut p).is_powered());
    }
}
