//! One-time-programmable memory provisioning for Renesas RZ/T2M, RZ/N2L and
//! RZ/T2L.
//!
//! OTP bits can only be programmed, never erased, so every write here is
//! checked against the device's address map before the controller is touched,
//! verified by reading it back, and wrapped in a power-on/power-off bracket
//! that is closed on every path.
//!
//! ```
//! use rz_otp::{
//!     AddressMap, Command, Controller, Provisioner, Response, SimPort,
//! };
//!
//! let otp = Controller::new(SimPort::new());
//! let mut otp = Provisioner::with_map(otp, AddressMap::RZT2M);
//!
//! otp.execute(Command::WriteOtp {
//!     address: 0x01c0,
//!     data: 0x1234,
//! })
//! .unwrap();
//! assert_eq!(
//!     otp.execute(Command::ReadOtp { address: 0x01c0 }),
//!     Ok(Response::Word(0x1234)),
//! );
//! ```

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod auth;
pub mod cmd;
pub mod command;
pub mod ident;
pub mod map;
pub mod otp;
pub mod regs;
pub mod shared;
pub mod sim;

pub use auth::{AuthConfig, AuthMode, AuthType};
pub use cmd::{CmdError, Provisioner};
pub use command::{Command, Response};
pub use ident::{AuthId, UniqueId};
pub use map::{AddressMap, Family, Intent, Region, WriteLockPolicy};
pub use otp::{Controller, OtpAddress, OtpError, OtpWord, PollBudget};
pub use regs::{ControllerPort, Mmio};
pub use shared::SharedProvisioner;
pub use sim::SimPort;
