//! Decoded host commands and their responses.

use crate::{
    auth::{AuthMode, AuthType},
    cmd::{CmdError, Provisioner},
    ident::{AuthId, UniqueId},
    otp::{OtpAddress, OtpWord},
    regs::ControllerPort,
};

/// A command decoded by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    WriteOtp { address: OtpAddress, data: OtpWord },
    ReadOtp { address: OtpAddress },
    SetJtagAuth { mode: AuthMode, auth_type: AuthType },
    GetJtagAuth,
    SetJtagAuthId {
        mode: AuthMode,
        auth_type: AuthType,
        id: AuthId,
    },
    SetSciUsbBoot { disable: bool },
    GetSciUsbBoot,
    GetUniqueId,
}

impl Command {
    /// Build [`Command::SetJtagAuth`] from raw mode and type codes.
    pub fn set_jtag_auth(mode: u8, auth_type: u8) -> Result<Self, CmdError> {
        let (mode, auth_type) = decode_auth(mode, auth_type)?;
        Ok(Self::SetJtagAuth { mode, auth_type })
    }

    /// Build [`Command::SetJtagAuthId`] from raw codes and an ID payload.
    pub fn set_jtag_auth_id(
        mode: u8,
        auth_type: u8,
        id: &[u8],
    ) -> Result<Self, CmdError> {
        let (mode, auth_type) = decode_auth(mode, auth_type)?;
        let id = AuthId::from_slice(id).ok_or(CmdError::DataInvalid)?;
        Ok(Self::SetJtagAuthId {
            mode,
            auth_type,
            id,
        })
    }
}

fn decode_auth(
    mode: u8,
    auth_type: u8,
) -> Result<(AuthMode, AuthType), CmdError> {
    match (AuthMode::from_raw(mode), AuthType::from_raw(auth_type)) {
        (Some(mode), Some(auth_type)) => Ok((mode, auth_type)),
        _ => Err(CmdError::DataInvalid),
    }
}

/// Successful command outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    Done,
    Word(OtpWord),
    JtagAuth { mode: AuthMode, auth_type: AuthType },
    SciUsbBoot { disabled: bool },
    UniqueId(UniqueId),
}

impl<P: ControllerPort> Provisioner<P> {
    /// Run one command to completion.
    pub fn execute(&mut self, command: Command) -> Result<Response, CmdError> {
        debug!("OTP command {}", command);

        let response = match command {
            Command::WriteOtp { address, data } => {
                self.write(address, data).map(|()| Response::Done)
            }
            Command::ReadOtp { address } => {
                self.read(address).map(Response::Word)
            }
            Command::SetJtagAuth { mode, auth_type } => self
                .set_jtag_auth(mode, auth_type)
                .map(|()| Response::Done),
            Command::GetJtagAuth => self.jtag_auth().map(|config| {
                Response::JtagAuth {
                    mode: config.mode,
                    auth_type: config.auth_type,
                }
            }),
            Command::SetJtagAuthId {
                mode,
                auth_type,
                id,
            } => self
                .set_jtag_auth_id(mode, auth_type, &id)
                .map(|()| Response::Done),
            Command::SetSciUsbBoot { disable } => {
                self.set_sci_usb_boot(disable).map(|()| Response::Done)
            }
            Command::GetSciUsbBoot => self
                .sci_usb_boot()
                .map(|disabled| Response::SciUsbBoot { disabled }),
            Command::GetUniqueId => {
                self.read_unique_id().map(Response::UniqueId)
            }
        };

        if let Err(err) = response {
            warn!("OTP command failed: {}", err);
        }

        response
    }
}
