//! Serialized access to the one OTP controller.

use core::cell::RefCell;
use critical_section::Mutex;

use crate::{
    cmd::{CmdError, Provisioner},
    command::{Command, Response},
    regs::ControllerPort,
};

/// A [`Provisioner`] that can be placed in a `static` and used from any
/// execution context.
///
/// Each call runs inside a critical section, so one command's power bracket
/// always completes before another begins.
pub struct SharedProvisioner<P> {
    inner: Mutex<RefCell<Option<Provisioner<P>>>>,
}

/// The provisioner was used from inside its own lock, or was never installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Unavailable;

impl<P: ControllerPort> SharedProvisioner<P> {
    /// Creates an empty [`SharedProvisioner`].
    ///
    /// Commands fail until [`SharedProvisioner::install`] is called.
    pub const fn empty() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Creates a new [`SharedProvisioner`] holding `provisioner`.
    pub const fn new(provisioner: Provisioner<P>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Some(provisioner))),
        }
    }

    /// Install a provisioner, returning any previous one.
    ///
    /// Refused from inside [`SharedProvisioner::lock`]; `provisioner` is
    /// dropped in that case.
    pub fn install(
        &self,
        provisioner: Provisioner<P>,
    ) -> Result<Option<Provisioner<P>>, Unavailable> {
        self.with_slot(|slot| slot.replace(provisioner))
    }

    /// Remove the provisioner.
    pub fn take(&self) -> Result<Option<Provisioner<P>>, Unavailable> {
        self.with_slot(Option::take)
    }

    fn with_slot<R>(
        &self,
        f: impl FnOnce(&mut Option<Provisioner<P>>) -> R,
    ) -> Result<R, Unavailable> {
        critical_section::with(|cs| {
            let mut slot = self
                .inner
                .borrow(cs)
                .try_borrow_mut()
                .map_err(|_| Unavailable)?;
            Ok(f(&mut *slot))
        })
    }

    /// Run `f` with exclusive access to the provisioner.
    pub fn lock<R>(
        &self,
        f: impl FnOnce(&mut Provisioner<P>) -> R,
    ) -> Result<R, Unavailable> {
        self.with_slot(|slot| slot.as_mut().map(f))?.ok_or(Unavailable)
    }

    /// Run one command with exclusive access to the controller.
    ///
    /// A provisioner that cannot be reached reports [`CmdError::DataInvalid`];
    /// the controller is not touched.
    pub fn execute(&self, command: Command) -> Result<Response, CmdError> {
        self.lock(|provisioner| provisioner.execute(command))
            .unwrap_or_else(|Unavailable| {
                error!("OTP provisioner unavailable");
                Err(CmdError::DataInvalid)
            })
    }
}
