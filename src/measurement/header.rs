// src/measurement/header.rs

//! Group/type header of the binary packets.
//!
//! ```text
//! group bytes   : [g0 (bit7 = more)] [g1] ...
//! type masks    : one or two u16 LE words per enabled group, bit15 = more
//! ```

use super::enabled::{BinaryGroup, EnabledMeasurements};
use super::groups::COMMON_FIELDS;

/// Group bytes understood by this implementation (original groups + one extension byte).
pub const MAX_GROUP_BYTES: usize = 2;
/// Type words per group; fields are numbered up to 30.
pub const MAX_TYPE_WORDS: usize = 2;
/// Groups a header can enable at once.
pub const MAX_HEADER_GROUPS: usize = 8;

const GROUP_EXTENSION_BIT: u8 = 0x80;
const TYPE_EXTENSION_BIT: u16 = 0x8000;
/// Type bits that collide with the per-word extension flags.
const TYPE_FLAG_BITS: u32 = 0x8000_8000;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HeaderError {
    /// More bytes are needed to finish the header.
    Incomplete,
    /// A group bit with no known group was set.
    UnknownGroup(u8),
    /// The group extension chain is longer than supported.
    TooManyGroupBytes,
    /// A type extension chain is longer than supported.
    TooManyTypeWords,
    /// Type bits overlap the extension flag positions.
    InvalidTypes,
}

/// Fields enabled for one group.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GroupTypes {
    pub group: BinaryGroup,
    pub types: u32,
}

/// Decoded binary header, groups kept in wire order.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BinaryHeader {
    groups: heapless::Vec<GroupTypes, MAX_HEADER_GROUPS>,
}

impl BinaryHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or merges into) a group, keeping wire order.
    pub fn with_group(mut self, group: BinaryGroup, types: u32) -> Result<Self, HeaderError> {
        if types & TYPE_FLAG_BITS != 0 {
            return Err(HeaderError::InvalidTypes);
        }
        match self.groups.iter().position(|g| g.group.header_bit() >= group.header_bit()) {
            Some(idx) if self.groups[idx].group == group => self.groups[idx].types |= types,
            Some(idx) => self
                .groups
                .insert(idx, GroupTypes { group, types })
                .map_err(|_| HeaderError::UnknownGroup(group.header_bit()))?,
            None => self
                .groups
                .push(GroupTypes { group, types })
                .map_err(|_| HeaderError::UnknownGroup(group.header_bit()))?,
        }
        Ok(self)
    }

    /// Header enabling exactly the fields in `enabled` (never uses the common group).
    pub fn from_enabled(enabled: &EnabledMeasurements) -> Self {
        let mut header = BinaryHeader::new();
        for group in BinaryGroup::MEASUREMENT_GROUPS {
            let types = enabled.group(group) & !TYPE_FLAG_BITS;
            if types != 0 {
                // groups are visited in wire order and masked, so this cannot fail
                if let Ok(next) = header.clone().with_group(group, types) {
                    header = next;
                }
            }
        }
        header
    }

    pub fn groups(&self) -> &[GroupTypes] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn types(&self, group: BinaryGroup) -> u32 {
        self.groups.iter().find(|g| g.group == group).map_or(0, |g| g.types)
    }

    pub fn contains_group(&self, group: BinaryGroup) -> bool {
        self.groups.iter().any(|g| g.group == group)
    }

    /// Decodes a header from the bytes following the sync byte.
    ///
    /// A group byte with its top bit set is followed by another group byte; likewise a type
    /// word with bit 15 set is followed by another word for the same group.
    ///
    /// # Arguments
    ///
    /// * `data`: Bytes after the sync byte. Trailing payload bytes are ignored.
    ///
    /// # Returns
    ///
    /// The header and the number of bytes it occupied, or [`HeaderError::Incomplete`] when
    /// `data` ends inside the header.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), HeaderError> {
        let mut pos = 0;
        let mut group_bits: u32 = 0;
        let mut group_bytes = 0;
        loop {
            if group_bytes == MAX_GROUP_BYTES {
                return Err(HeaderError::TooManyGroupBytes);
            }
            let byte = *data.get(pos).ok_or(HeaderError::Incomplete)?;
            pos += 1;
            group_bits |= u32::from(byte & !GROUP_EXTENSION_BIT) << (8 * group_bytes);
            group_bytes += 1;
            if byte & GROUP_EXTENSION_BIT == 0 {
                break;
            }
        }

        let mut header = BinaryHeader::new();
        for bit in 0..(8 * group_bytes as u8) {
            if group_bits & (1 << bit) == 0 {
                continue;
            }
            let group = BinaryGroup::from_header_bit(bit).ok_or(HeaderError::UnknownGroup(bit))?;

            let mut types: u32 = 0;
            let mut words = 0;
            loop {
                if words == MAX_TYPE_WORDS {
                    return Err(HeaderError::TooManyTypeWords);
                }
                let bytes = data.get(pos..pos + 2).ok_or(HeaderError::Incomplete)?;
                let word = u16::from_le_bytes([bytes[0], bytes[1]]);
                pos += 2;
                types |= u32::from(word & !TYPE_EXTENSION_BIT) << (16 * words);
                words += 1;
                if word & TYPE_EXTENSION_BIT == 0 {
                    break;
                }
            }
            header
                .groups
                .push(GroupTypes { group, types })
                .map_err(|_| HeaderError::UnknownGroup(bit))?;
        }
        Ok((header, pos))
    }

    /// Appends the wire form of the header to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let group_bits = self
            .groups
            .iter()
            .fold(0u32, |acc, g| acc | (1 << g.group.header_bit()));
        let group_bytes = if group_bits >> 8 != 0 { 2 } else { 1 };
        for i in 0..group_bytes {
            let mut byte = ((group_bits >> (8 * i)) as u8) & !GROUP_EXTENSION_BIT;
            if i + 1 < group_bytes {
                byte |= GROUP_EXTENSION_BIT;
            }
            out.push(byte);
        }

        for g in &self.groups {
            let words = if g.types >> 16 != 0 { 2 } else { 1 };
            for i in 0..words {
                let mut word = ((g.types >> (16 * i)) as u16) & !TYPE_EXTENSION_BIT;
                if i + 1 < words {
                    word |= TYPE_EXTENSION_BIT;
                }
                out.extend_from_slice(&word.to_le_bytes());
            }
        }
    }

    pub fn encoded_len(&self) -> usize {
        let group_bytes = if self.groups.iter().any(|g| g.group.is_extended()) { 2 } else { 1 };
        let words: usize = self
            .groups
            .iter()
            .map(|g| if g.types >> 16 != 0 { 2 } else { 1 })
            .sum();
        group_bytes + 2 * words
    }

    /// Fields carried by the packet, with common-group fields folded into their own groups.
    pub fn enabled_measurements(&self) -> EnabledMeasurements {
        let mut enabled = EnabledMeasurements::none();
        for g in &self.groups {
            match g.group {
                BinaryGroup::Common => {
                    for (bit, aliases) in COMMON_FIELDS.iter().enumerate() {
                        if g.types & (1 << bit) != 0 {
                            for (group, field) in aliases.iter() {
                                enabled.enable(*group, *field);
                            }
                        }
                    }
                }
                group => enabled.set_group(group, enabled.group(group) | g.types),
            }
        }
        enabled
    }
}
