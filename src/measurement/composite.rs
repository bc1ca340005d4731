// src/measurement/composite.rs

use core::time::Duration;

use crate::common::ascii::{self, AsciiHeader};
use crate::packet::BinaryFraming;

use super::enabled::{BinaryGroup, EnabledMeasurements};
use super::groups::{
    field_size, wire_fields, AttitudeGroup, GnssGroup, ImuGroup, InsGroup, TimeGroup,
};
use super::header::BinaryHeader;
use super::types::{ByteReader, DecodeError};

/// The packet a record was decoded from.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum MeasurementSource {
    /// Built in code rather than decoded.
    #[default]
    Detached,
    /// An ASCII output, by header token (`VNINS`, `VNYMR`, ...).
    Ascii(AsciiHeader),
    Binary(BinaryFraming),
}

/// Every measurement a packet can carry, one typed record per group.
///
/// Fields absent from the packet stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeData {
    pub time: TimeGroup,
    pub imu: ImuGroup,
    pub gnss: GnssGroup,
    pub attitude: AttitudeGroup,
    pub ins: InsGroup,
    pub gnss2: GnssGroup,
    pub gnss3: GnssGroup,
    /// Receive time of the packet the record was decoded from.
    pub timestamp: Duration,
    pub source: MeasurementSource,
}

impl CompositeData {
    /// Decodes a binary payload (the bytes between header and CRC).
    pub fn from_binary(header: &BinaryHeader, payload: &[u8]) -> Result<Self, DecodeError> {
        let mut data = CompositeData::default();
        let mut reader = ByteReader::new(payload);
        for (group, field) in wire_fields(header)? {
            if !data.decode_field(group, field, &mut reader)? {
                return Err(DecodeError::UnknownField { group: group.header_bit(), field });
            }
        }
        match reader.remaining() {
            0 => Ok(data),
            remaining => Err(DecodeError::TrailingBytes { remaining }),
        }
    }

    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_source(mut self, source: MeasurementSource) -> Self {
        self.source = source;
        self
    }

    /// True when the record came from the ASCII output `header`.
    ///
    /// # Arguments
    ///
    /// * `header`: Header token, with or without the leading `$` (`"VNINS"` or `"$VNINS"`).
    ///
    /// # Returns
    ///
    /// `false` for binary and detached records.
    pub fn matches_message(&self, header: &str) -> bool {
        match &self.source {
            MeasurementSource::Ascii(source) => source.as_str() == ascii::header(header),
            MeasurementSource::Binary(_) | MeasurementSource::Detached => false,
        }
    }

    fn decode_field(
        &mut self,
        group: BinaryGroup,
        field: u8,
        reader: &mut ByteReader<'_>,
    ) -> Result<bool, DecodeError> {
        match group {
            BinaryGroup::Common => Ok(false),
            BinaryGroup::Time => self.time.decode_field(field, reader),
            BinaryGroup::Imu => self.imu.decode_field(field, reader),
            BinaryGroup::Gnss => self.gnss.decode_field(field, reader),
            BinaryGroup::Attitude => self.attitude.decode_field(field, reader),
            BinaryGroup::Ins => self.ins.decode_field(field, reader),
            BinaryGroup::Gnss2 => self.gnss2.decode_field(field, reader),
            BinaryGroup::Gnss3 => self.gnss3.decode_field(field, reader),
        }
    }

    /// Fields that hold a value.
    pub fn enabled_measurements(&self) -> EnabledMeasurements {
        EnabledMeasurements([
            self.time.present_fields(),
            self.imu.present_fields(),
            self.gnss.present_fields(),
            self.attitude.present_fields(),
            self.ins.present_fields(),
            self.gnss2.present_fields(),
            self.gnss3.present_fields(),
        ])
    }
}

/// Walks the size table over `payload` and returns how many bytes the fields occupy.
///
/// `Ok(None)` means a counted field's element count is not buffered yet.
pub fn payload_length(
    fields: &[(BinaryGroup, u8)],
    payload: &[u8],
) -> Result<Option<usize>, DecodeError> {
    let mut pos = 0;
    for &(group, field) in fields {
        let size = field_size(group, field)
            .ok_or(DecodeError::UnknownField { group: group.header_bit(), field })?;
        match size.resolve(payload.get(pos..).unwrap_or(&[]))? {
            Some(width) => pos += width,
            None => return Ok(None),
        }
    }
    Ok(Some(pos))
}
