//! OTP address map and write policy.
//!
//! Region boundaries differ between device families. Every family's map is
//! always available; the `rzt2m`, `rzn2l` and `rzt2l` features only choose
//! [`AddressMap::DEFAULT`].

use crate::otp::{OtpAddress, OtpError, OtpWord};

/// JTAG authentication mode word.
pub const JTAG_AUTH_MODE: OtpAddress = 0x0091;
/// JTAG authentication type word.
pub const JTAG_AUTH_TYPE: OtpAddress = 0x0092;
/// SCI/USB boot setting word.
pub const SCI_USB_BOOT: OtpAddress = 0x018d;
/// First word of the 16-byte unique ID.
pub const UNIQUE_ID: OtpAddress = 0x0089;
/// Part number word.
pub const PART_NUMBER: OtpAddress = 0x01a7;
/// Product version word.
pub const PRODUCT_VERSION: OtpAddress = 0x01a9;

/// Supported device families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Family {
    RzT2m,
    RzN2l,
    RzT2l,
}

/// Inclusive range of word addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Span {
    pub first: OtpAddress,
    pub last: OtpAddress,
}

impl Span {
    pub const fn new(first: OtpAddress, last: OtpAddress) -> Self {
        Self { first, last }
    }

    /// Span of `words` words starting at `first`.
    pub const fn words(first: OtpAddress, words: u16) -> Self {
        Self {
            first,
            last: first + words - 1,
        }
    }

    pub const fn contains(&self, address: OtpAddress) -> bool {
        self.first <= address && address <= self.last
    }

    pub const fn len(&self) -> usize {
        (self.last - self.first) as usize + 1
    }
}

/// JTAG authentication ID slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdSlot {
    /// Level 1 ID, plain.
    Level1Plain,
    /// Level 2 ID, plain.
    Level2Plain,
    /// Level 1 ID, hashed.
    Level1Hash,
    /// Level 2 ID, hashed.
    Level2Hash,
}

impl IdSlot {
    pub const ALL: [Self; 4] = [
        Self::Level1Plain,
        Self::Level2Plain,
        Self::Level1Hash,
        Self::Level2Hash,
    ];

    pub const fn span(self) -> Span {
        match self {
            Self::Level1Plain => Span::words(0x0093, 8),
            Self::Level2Plain => Span::words(0x009b, 8),
            Self::Level1Hash => Span::words(0x016d, 16),
            Self::Level2Hash => Span::words(0x017d, 16),
        }
    }

    pub const fn address(self) -> OtpAddress {
        self.span().first
    }

    /// Secret size in bytes.
    pub const fn len_bytes(self) -> usize {
        self.span().len() * 2
    }
}

/// Named region of OTP address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Region {
    AntiRollbackCounter,
    UserData,
    SHostIfBootMode,
    PHostIfBootMode,
    PartNumber,
    ProductVersion,
    /// RGMII TX/RX clock delay OSC mode clock count.
    ClockCount,
    JtagAuthMode,
    JtagAuthType,
    JtagAuthId(IdSlot),
    SciUsbBoot,
    UniqueId,
}

/// Kind of access being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Intent {
    Read,
    Write,
}

/// How a written word is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteLockPolicy {
    /// Read-back must equal the written value.
    Disabled,
    /// Bits programmed earlier are tolerated: only the written bits must read
    /// back set.
    Enabled,
}

impl WriteLockPolicy {
    /// Whether `read_back` confirms a write of `written`.
    pub const fn verify(self, written: OtpWord, read_back: OtpWord) -> bool {
        match self {
            Self::Disabled => read_back == written,
            Self::Enabled => read_back & written == written,
        }
    }
}

impl Region {
    /// Whether the generic word read/write path may access this region.
    ///
    /// JTAG, SCI/USB boot and unique ID words are only reachable through their
    /// dedicated operations.
    pub const fn permits(self, intent: Intent) -> bool {
        match self {
            Self::AntiRollbackCounter
            | Self::UserData
            | Self::SHostIfBootMode
            | Self::PHostIfBootMode => true,
            Self::PartNumber | Self::ProductVersion | Self::ClockCount => {
                matches!(intent, Intent::Read)
            }
            Self::JtagAuthMode
            | Self::JtagAuthType
            | Self::JtagAuthId(_)
            | Self::SciUsbBoot
            | Self::UniqueId => false,
        }
    }

    /// Only the anti-rollback counter tolerates bits programmed earlier;
    /// every other writable region, boot-mode areas included, must read back
    /// exactly.
    pub const fn write_lock(self) -> WriteLockPolicy {
        match self {
            Self::AntiRollbackCounter => WriteLockPolicy::Enabled,
            _ => WriteLockPolicy::Disabled,
        }
    }
}

/// Region boundaries for one device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressMap {
    pub family: Family,
    pub counter: Span,
    pub user: Span,
    pub tx_clock_count: Option<Span>,
    pub rx_clock_count: Option<Span>,
    pub shostif_boot: Option<Span>,
    pub phostif_boot: Option<Span>,
}

const COUNTER: Span = Span::new(0x0159, 0x016c);
const UNIQUE_ID_SPAN: Span = Span::words(UNIQUE_ID, 8);

impl AddressMap {
    pub const RZT2M: Self = Self {
        family: Family::RzT2m,
        counter: COUNTER,
        user: Span::new(0x01bd, 0x01cf),
        tx_clock_count: Some(Span::new(0x01b1, 0x01b2)),
        rx_clock_count: Some(Span::new(0x01b3, 0x01b4)),
        shostif_boot: None,
        phostif_boot: None,
    };

    pub const RZN2L: Self = Self {
        family: Family::RzN2l,
        counter: COUNTER,
        user: Span::new(0x01bd, 0x01cf),
        tx_clock_count: Some(Span::new(0x01b1, 0x01b1)),
        rx_clock_count: Some(Span::new(0x01b3, 0x01b3)),
        shostif_boot: Some(Span::new(0x01b5, 0x01b8)),
        phostif_boot: Some(Span::new(0x01b9, 0x01bc)),
    };

    pub const RZT2L: Self = Self {
        family: Family::RzT2l,
        counter: COUNTER,
        user: Span::new(0x01b9, 0x01cf),
        tx_clock_count: None,
        rx_clock_count: None,
        shostif_boot: Some(Span::new(0x01b5, 0x01b8)),
        phostif_boot: None,
    };

    #[cfg(feature = "rzn2l")]
    pub const DEFAULT: Self = Self::RZN2L;
    #[cfg(all(feature = "rzt2l", not(feature = "rzn2l")))]
    pub const DEFAULT: Self = Self::RZT2L;
    #[cfg(not(any(feature = "rzn2l", feature = "rzt2l")))]
    pub const DEFAULT: Self = Self::RZT2M;

    pub const fn for_family(family: Family) -> Self {
        match family {
            Family::RzT2m => Self::RZT2M,
            Family::RzN2l => Self::RZN2L,
            Family::RzT2l => Self::RZT2L,
        }
    }

    /// Region containing `address`, if any.
    pub fn region(&self, address: OtpAddress) -> Option<Region> {
        let within =
            |span: Option<Span>| span.is_some_and(|s| s.contains(address));

        if self.counter.contains(address) {
            Some(Region::AntiRollbackCounter)
        } else if self.user.contains(address) {
            Some(Region::UserData)
        } else if within(self.shostif_boot) {
            Some(Region::SHostIfBootMode)
        } else if within(self.phostif_boot) {
            Some(Region::PHostIfBootMode)
        } else if within(self.tx_clock_count) || within(self.rx_clock_count) {
            Some(Region::ClockCount)
        } else if address == PART_NUMBER {
            Some(Region::PartNumber)
        } else if address == PRODUCT_VERSION {
            Some(Region::ProductVersion)
        } else if address == JTAG_AUTH_MODE {
            Some(Region::JtagAuthMode)
        } else if address == JTAG_AUTH_TYPE {
            Some(Region::JtagAuthType)
        } else if address == SCI_USB_BOOT {
            Some(Region::SciUsbBoot)
        } else if UNIQUE_ID_SPAN.contains(address) {
            Some(Region::UniqueId)
        } else {
            IdSlot::ALL
                .into_iter()
                .find(|slot| slot.span().contains(address))
                .map(Region::JtagAuthId)
        }
    }

    /// Classify `address` for a generic word access.
    ///
    /// Fails with [`OtpError::InvalidAddress`] if the address is in no region
    /// or its region does not permit `intent`.
    pub fn classify(
        &self,
        address: OtpAddress,
        intent: Intent,
    ) -> Result<Region, OtpError> {
        match self.region(address) {
            Some(region) if region.permits(intent) => Ok(region),
            _ => Err(OtpError::InvalidAddress),
        }
    }
}

impl Default for AddressMap {
    fn default() -> Self {
        Self::DEFAULT
    }
}
