// SPDX-License-Identifier: MIT

//! The HID item layer. This module handles splitting a report descriptor
//! byte stream into its individual items. Interpretation of the resulting
//! [Item]s is left to the caller, usually the descriptor parser in the
//! crate root; this layer accepts every bit pattern and only fails when
//! the stream ends in the middle of an item.
//!
//! In this document and unless stated otherwise, a reference to "Section a.b.c" refers to the
//! [HID Device Class Definition for HID 1.11](https://www.usb.org/document-library/device-class-definition-hid-111).
//!
//! Entry point is usually [`ReportDescriptorItems::try_from(bytes)`](ReportDescriptorItems::try_from):
//!
//! ```
//! # use crate::hideval::hid::*;
//! # fn parse(bytes: &[u8]) {
//! let rdesc_items = ReportDescriptorItems::try_from(bytes).unwrap();
//! for rdesc_item in rdesc_items.iter() {
//!     println!("Item at offset {:02x}: {}", rdesc_item.offset(), rdesc_item.item());
//! }
//! # }
//! ```

use crate::{ensure, ParserError};

type Result<T> = std::result::Result<T, ParserError>;

/// The kind of a HID item, bits 2..3 of a short item's prefix byte
/// (Section 6.2.2.2). Long items (Section 6.2.2.3) report
/// [ItemKind::Reserved].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Main,
    Global,
    Local,
    Reserved,
}

/// A single item split off a report descriptor byte stream.
///
/// Short items carry a numeric value of 0, 1, 2 or 4 data bytes,
/// sign-extended to 32 bits from the 1- and 2-byte widths. Long items
/// carry an opaque data payload and an 8-bit tag of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Short {
        kind: ItemKind,
        tag: u8,
        length: usize,
        value: i32,
    },
    Long {
        tag: u8,
        data: Vec<u8>,
    },
}

impl Item {
    /// Read one item off the front of `bytes`. Returns `None` at the end
    /// of the stream and [ParserError::UnexpectedEof] when the stream
    /// ends in the middle of an item.
    pub fn read(bytes: &[u8]) -> Result<Option<Item>> {
        let Some(&header) = bytes.first() else {
            return Ok(None);
        };

        let kind = match (header >> 2) & 0b11 {
            0 => ItemKind::Main,
            1 => ItemKind::Global,
            2 => ItemKind::Local,
            _ => ItemKind::Reserved,
        };
        let tag = (header >> 4) & 0x0f;

        // Long item form: a Reserved prefix with tag nibble 0xf, then a
        // length byte, the real tag byte and the data (Section 6.2.2.3).
        if kind == ItemKind::Reserved && tag == 0x0f {
            ensure!(bytes.len() >= 3, ParserError::UnexpectedEof);
            let length = bytes[1] as usize;
            ensure!(bytes.len() >= 3 + length, ParserError::UnexpectedEof);
            return Ok(Some(Item::Long {
                tag: bytes[2],
                data: bytes[3..3 + length].to_vec(),
            }));
        }

        let length = match header & 0b11 {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        };
        ensure!(bytes.len() > length, ParserError::UnexpectedEof);

        let data = &bytes[1..=length];
        let value = match length {
            0 => 0,
            1 => data[0] as i8 as i32,
            2 => i16::from_le_bytes(data.try_into().unwrap()) as i32,
            _ => i32::from_le_bytes(data.try_into().unwrap()),
        };

        Ok(Some(Item::Short {
            kind,
            tag,
            length,
            value,
        }))
    }

    /// The kind of this item; always [ItemKind::Reserved] for long items.
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Short { kind, .. } => *kind,
            Item::Long { .. } => ItemKind::Reserved,
        }
    }

    /// The tag of this item: the prefix tag nibble for short items, the
    /// dedicated tag byte for long items.
    pub fn tag(&self) -> u8 {
        match self {
            Item::Short { tag, .. } => *tag,
            Item::Long { tag, .. } => *tag,
        }
    }

    /// The number of data bytes of this item.
    pub fn length(&self) -> usize {
        match self {
            Item::Short { length, .. } => *length,
            Item::Long { data, .. } => data.len(),
        }
    }

    /// The sign-extended value of a short item; zero for long items.
    pub fn value(&self) -> i32 {
        match self {
            Item::Short { value, .. } => *value,
            Item::Long { .. } => 0,
        }
    }

    /// The item value reinterpreted as an unsigned integer of the item's
    /// original data width.
    pub fn unsigned(&self) -> u32 {
        match self {
            Item::Short {
                length: 1, value, ..
            } => (*value & 0xff) as u32,
            Item::Short {
                length: 2, value, ..
            } => (*value & 0xffff) as u32,
            Item::Short { value, .. } => *value as u32,
            Item::Long { .. } => 0,
        }
    }

    /// The encoded size of this item in bytes, inclusive of the prefix.
    /// For short items this is the data length plus 1; for long items the
    /// data length plus 3 (prefix, length byte, tag byte).
    pub fn size(&self) -> usize {
        match self {
            Item::Short { length, .. } => length + 1,
            Item::Long { data, .. } => data.len() + 3,
        }
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Item::Short {
                kind, tag, length, ..
            } => write!(
                f,
                "[Item {:<8} {:02x}={:08x} length={}]",
                format!("{kind:?}"),
                tag,
                self.unsigned(),
                length
            ),
            Item::Long { tag, data } => write!(
                f,
                "[Item Long     {:02x}={} length={}]",
                tag,
                crate::bits::to_hex(data),
                data.len()
            ),
        }
    }
}

/// A single item and the byte offset it was extracted from.
#[derive(Debug)]
pub struct ReportDescriptorItem {
    offset: usize,
    item: Item,
}

impl ReportDescriptorItem {
    /// The offset of this item in the report descriptor it was extracted from.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The item itself.
    pub fn item(&self) -> &Item {
        &self.item
    }
}

/// The set of items extracted from a report descriptor byte array. This
/// is the result of splitting a report descriptor without *interpreting*
/// it and is what the descriptor parser walks.
#[derive(Debug)]
pub struct ReportDescriptorItems {
    items: Vec<ReportDescriptorItem>,
}

impl std::ops::Deref for ReportDescriptorItems {
    type Target = [ReportDescriptorItem];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl TryFrom<&[u8]> for ReportDescriptorItems {
    type Error = ParserError;

    /// Attempts to itemize the given HID report descriptor into its set
    /// of [ReportDescriptorItem]s.
    fn try_from(bytes: &[u8]) -> Result<Self> {
        itemize(bytes)
    }
}

fn itemize(bytes: &[u8]) -> Result<ReportDescriptorItems> {
    let mut offset = 0;
    let mut items: Vec<ReportDescriptorItem> = Vec::new();
    while let Some(item) = Item::read(&bytes[offset..])? {
        let off = offset;
        offset += item.size();
        items.push(ReportDescriptorItem { offset: off, item });
    }
    Ok(ReportDescriptorItems { items })
}
