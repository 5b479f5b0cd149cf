// SPDX-License-Identifier: MIT

//! Standalone HID domain types shared between the item layer and the
//! compiled report model.
//!
//! In this document and unless stated otherwise, a reference to "Section a.b.c" refers to the
//! [HID Device Class Definition for HID 1.11](https://www.usb.org/document-library/device-class-definition-hid-111).

/// A fully qualified HID Usage: the Usage Page in the upper 16 bits,
/// the Usage ID in the lower 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Usage(pub u32);

impl Usage {
    /// The Usage Page component of this Usage.
    pub fn page(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// The Usage ID component of this Usage.
    pub fn id(&self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl From<u32> for Usage {
    fn from(value: u32) -> Usage {
        Usage(value)
    }
}

impl From<Usage> for u32 {
    fn from(usage: Usage) -> u32 {
        usage.0
    }
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// The direction of a control: input (device to host), output (host to
/// device) or feature (bidirectional configuration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Input,
    Output,
    Feature,
}

/// The type of a [Collection](crate::Collection), see Section 6.2.2.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Physical,
    Application,
    Logical,
    Report,
    NamedArray,
    UsageSwitch,
    UsageModifier,
    Reserved { value: u8 },
    VendorDefined { value: u8 },
}

impl From<u8> for CollectionKind {
    fn from(value: u8) -> CollectionKind {
        match value {
            0x00 => CollectionKind::Physical,
            0x01 => CollectionKind::Application,
            0x02 => CollectionKind::Logical,
            0x03 => CollectionKind::Report,
            0x04 => CollectionKind::NamedArray,
            0x05 => CollectionKind::UsageSwitch,
            0x06 => CollectionKind::UsageModifier,
            value @ 0x07..=0x7f => CollectionKind::Reserved { value },
            value @ 0x80..=0xff => CollectionKind::VendorDefined { value },
        }
    }
}

impl From<&CollectionKind> for u8 {
    fn from(kind: &CollectionKind) -> u8 {
        match kind {
            CollectionKind::Physical => 0x00,
            CollectionKind::Application => 0x01,
            CollectionKind::Logical => 0x02,
            CollectionKind::Report => 0x03,
            CollectionKind::NamedArray => 0x04,
            CollectionKind::UsageSwitch => 0x05,
            CollectionKind::UsageModifier => 0x06,
            CollectionKind::Reserved { value } => *value,
            CollectionKind::VendorDefined { value } => *value,
        }
    }
}

/// One side of the nine paired main item data flags, see Section 6.2.2.5.
/// Each pair occupies one bit in the item data: the even-numbered flag is
/// selected when the bit is 0, its odd-numbered opposite when the bit is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flag {
    Data = 0,
    Constant = 1,
    Array = 2,
    Variable = 3,
    Absolute = 4,
    Relative = 5,
    NoWrap = 6,
    Wrap = 7,
    Linear = 8,
    Nonlinear = 9,
    PreferredState = 10,
    NoPreferred = 11,
    NoNullPosition = 12,
    NullState = 13,
    Nonvolatile = 14,
    Volatile = 15,
    BitField = 16,
    BufferedBytes = 17,
}

impl Flag {
    const ALL: [Flag; 18] = [
        Flag::Data,
        Flag::Constant,
        Flag::Array,
        Flag::Variable,
        Flag::Absolute,
        Flag::Relative,
        Flag::NoWrap,
        Flag::Wrap,
        Flag::Linear,
        Flag::Nonlinear,
        Flag::PreferredState,
        Flag::NoPreferred,
        Flag::NoNullPosition,
        Flag::NullState,
        Flag::Nonvolatile,
        Flag::Volatile,
        Flag::BitField,
        Flag::BufferedBytes,
    ];
}

/// The set of [Flag]s decoded from a main item's 9-bit data word.
/// A set always holds exactly one flag of each pair; bits above bit 8 of
/// the data word are ignored.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Flags(u32);

impl Flags {
    /// Decode the nine flag pairs from the data word of an Input, Output
    /// or Feature item.
    pub fn from_bits(bits: u32) -> Flags {
        let mut set = 0u32;
        for pair in 0..9u32 {
            let flag = if bits & (1 << pair) == 0 {
                2 * pair
            } else {
                2 * pair + 1
            };
            set |= 1 << flag;
        }
        Flags(set)
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.0 & (1 << flag as u32) != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        Flag::ALL.iter().copied().filter(|f| self.contains(*f))
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
