//! Fixed-size identifiers stored in OTP.

use core::fmt::Formatter;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Factory-programmed unique device ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromZeroes, FromBytes)]
#[repr(C)]
pub struct UniqueId([u8; 16]);

impl UniqueId {
    /// Assert size at compile time.
    const _SIZE: () = assert!(core::mem::size_of::<Self>() == 16);

    /// Creates a new [`UniqueId`].
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UniqueId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{:x}", self.0)
    }
}

impl core::fmt::Display for UniqueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Plain JTAG authentication ID.
///
/// The secret is never printed: `Debug` and `defmt::Format` redact it.
#[derive(Clone, Copy, PartialEq, Eq, AsBytes, FromZeroes, FromBytes)]
#[repr(C)]
pub struct AuthId([u8; 16]);

impl AuthId {
    /// Assert size at compile time.
    const _SIZE: () = assert!(core::mem::size_of::<Self>() == 16);

    /// Creates a new [`AuthId`].
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Read an ID from a payload, which must be exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        Self::read_from(bytes)
    }
}

impl core::fmt::Debug for AuthId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("AuthId(..)")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AuthId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "AuthId(..)")
    }
}
