// src/register/binary_output.rs

use core::fmt::Write;

use crate::common::ascii::AsciiMessage;
use crate::common::error::VnError;
use crate::measurement::{BinaryHeader, EnabledMeasurements};

/// Serial ports an output is emitted on (bit per port).
pub mod async_mode {
    pub const SERIAL1: u16 = 1 << 0;
    pub const SERIAL2: u16 = 1 << 1;
    pub const SPI: u16 = 1 << 2;
}

/// Contents of the binary output registers (75-77).
///
/// On the ASCII wire the output header is written as hex tokens, group bytes first and then
/// one token per type word: `<mode>,<divisor>,<g0>[,<g1>],<t0>,...`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryOutput {
    pub async_mode: u16,
    pub rate_divisor: u16,
    pub header: BinaryHeader,
}

impl BinaryOutput {
    pub fn new(async_mode: u16, rate_divisor: u16, measurements: &EnabledMeasurements) -> Self {
        BinaryOutput { async_mode, rate_divisor, header: BinaryHeader::from_enabled(measurements) }
    }

    /// Fields the output emits, with common fields expanded.
    pub fn enabled_measurements(&self) -> EnabledMeasurements {
        self.header.enabled_measurements()
    }

    pub(crate) fn parse<'a>(
        id: u8,
        mut fields: impl Iterator<Item = &'a str>,
    ) -> Result<Self, VnError> {
        let invalid = || VnError::InvalidRegisterValue(id);
        let async_mode = fields
            .next()
            .and_then(|f| u16::from_str_radix(f.trim(), 16).ok())
            .ok_or_else(invalid)?;
        let rate_divisor = fields.next().and_then(|f| f.trim().parse().ok()).ok_or_else(invalid)?;

        // group bytes until one without the extension bit, then type words
        let mut wire = Vec::new();
        let mut more_groups = true;
        for field in fields {
            let field = field.trim();
            if more_groups {
                let byte = u8::from_str_radix(field, 16).map_err(|_| invalid())?;
                more_groups = byte & 0x80 != 0;
                wire.push(byte);
            } else {
                let word = u16::from_str_radix(field, 16).map_err(|_| invalid())?;
                wire.extend_from_slice(&word.to_le_bytes());
            }
        }
        let (header, consumed) = BinaryHeader::decode(&wire).map_err(|_| invalid())?;
        if consumed != wire.len() {
            return Err(invalid());
        }
        Ok(BinaryOutput { async_mode, rate_divisor, header })
    }

    pub(crate) fn write_values(&self, out: &mut AsciiMessage) -> core::fmt::Result {
        write!(out, "{:X},{}", self.async_mode, self.rate_divisor)?;
        let mut wire = Vec::new();
        self.header.encode(&mut wire);
        let group_bytes = wire.len() - 2 * self.header_words();
        for byte in &wire[..group_bytes] {
            write!(out, ",{:X}", byte)?;
        }
        for pair in wire[group_bytes..].chunks_exact(2) {
            write!(out, ",{:X}", u16::from_le_bytes([pair[0], pair[1]]))?;
        }
        Ok(())
    }

    fn header_words(&self) -> usize {
        self.header
            .groups()
            .iter()
            .map(|g| if g.types >> 16 != 0 { 2 } else { 1 })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::BinaryGroup;

    #[test]
    fn test_parse_and_write() {
        let output = BinaryOutput::parse(75, "1,40,4,600".split(',')).unwrap();
        assert_eq!(output.async_mode, async_mode::SERIAL1);
        assert_eq!(output.rate_divisor, 40);
        assert_eq!(output.header.types(BinaryGroup::Imu), 0x600);

        let mut text = AsciiMessage::new();
        output.write_values(&mut text).unwrap();
        assert_eq!(text.as_str(), "1,40,4,600");
    }

    #[test]
    fn test_extension_tokens() {
        let enabled = EnabledMeasurements::none()
            .with(BinaryGroup::Time, 0)
            .with(BinaryGroup::Gnss3, 17);
        let output = BinaryOutput::new(3, 1, &enabled);
        let mut text = AsciiMessage::new();
        output.write_values(&mut text).unwrap();
        assert_eq!(text.as_str(), "3,1,82,1,1,8000,2");

        let parsed = BinaryOutput::parse(76, text.split(',')).unwrap();
        assert_eq!(parsed, output);
        assert_eq!(parsed.enabled_measurements(), enabled);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(BinaryOutput::parse(75, "1,40".split(',')).is_err());
        assert!(BinaryOutput::parse(75, "1,40,4".split(',')).is_err());
        assert!(BinaryOutput::parse(75, "1,40,4,600,1".split(',')).is_err());
        assert!(BinaryOutput::parse(75, "z,40,4,600".split(',')).is_err());
    }
}
