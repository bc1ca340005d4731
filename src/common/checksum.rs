// src/common/checksum.rs

use super::ascii::{AsciiMessage, ASCII_MESSAGE_MAX_LEN, CHECKSUM_DELIMITER, SYNC_CHAR};
use super::error::VnError;
use core::fmt::Write;
use crc::{Algorithm, Crc};

/// CRC-16 used by the sensor for both ASCII and binary framing.
/// Polynomial: 0x1021
/// Initial Value: 0x0000
/// Input Reflected: false
/// Output Reflected: false
/// Final XOR: 0x0000
/// Check Value: 0x31C3 (for "123456789"), i.e. CRC-16/XMODEM
pub const VN_CRC: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0x0000,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0x31C3,
    residue: 0x0000,
};

const CRC_COMPUTER: Crc<u16> = Crc::<u16>::new(&VN_CRC);

/// Calculates the 16-bit CRC over `data`.
///
/// ASCII frames cover the bytes between `$` and `*`; binary packets cover everything after
/// the sync byte up to the trailer.
///
/// # Arguments
///
/// * `data`: A slice of bytes for which to calculate the CRC.
///
/// # Returns
///
/// The calculated 16-bit CRC value.
#[inline]
pub fn calculate_crc16(data: &[u8]) -> u16 {
    CRC_COMPUTER.checksum(data)
}

/// Calculates the 8-bit XOR checksum over `data`.
#[inline]
pub fn calculate_checksum8(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Checksum appended to outbound ASCII commands.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum ChecksumMode {
    /// Two hex digits of XOR checksum.
    Checksum8,
    /// Four hex digits of CRC-16.
    #[default]
    Crc16,
}

impl ChecksumMode {
    pub fn compute(self, body: &[u8]) -> u16 {
        match self {
            ChecksumMode::Checksum8 => u16::from(calculate_checksum8(body)),
            ChecksumMode::Crc16 => calculate_crc16(body),
        }
    }

    /// Number of hex digits in the checksum field.
    pub const fn hex_digits(self) -> usize {
        match self {
            ChecksumMode::Checksum8 => 2,
            ChecksumMode::Crc16 => 4,
        }
    }

    const fn from_hex_digits(digits: usize) -> Option<Self> {
        match digits {
            2 => Some(ChecksumMode::Checksum8),
            4 => Some(ChecksumMode::Crc16),
            _ => None,
        }
    }
}

/// Which checksum widths are accepted on inbound ASCII frames.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum AsciiValidation {
    /// The width of the checksum field selects the algorithm.
    #[default]
    Auto,
    /// Only frames carrying an 8-bit checksum are accepted.
    Checksum8Only,
    /// Only frames carrying a CRC-16 are accepted.
    Crc16Only,
}

impl AsciiValidation {
    fn accepts(self, mode: ChecksumMode) -> bool {
        match self {
            AsciiValidation::Auto => true,
            AsciiValidation::Checksum8Only => mode == ChecksumMode::Checksum8,
            AsciiValidation::Crc16Only => mode == ChecksumMode::Crc16,
        }
    }
}

/// Appends `*<checksum>\r\n` to a message that starts with `$`.
///
/// The checksum covers everything after the leading `$`.
///
/// # Arguments
///
/// * `message`: The framed text so far, `$VN` prefix included.
/// * `mode`: Two hex digits of XOR checksum or four of CRC-16.
///
/// # Errors
///
/// [`VnError::InvalidFormat`] for an empty message and [`VnError::MessageTooLong`] when the
/// trailer does not fit.
pub fn append_checksum(message: &mut AsciiMessage, mode: ChecksumMode) -> Result<(), VnError> {
    let span = message.as_bytes().get(1..).ok_or(VnError::InvalidFormat)?;
    let value = mode.compute(span);
    let result = match mode {
        ChecksumMode::Checksum8 => write!(message, "*{:02X}\r\n", value),
        ChecksumMode::Crc16 => write!(message, "*{:04X}\r\n", value),
    };
    result.map_err(|_| VnError::MessageTooLong { max: ASCII_MESSAGE_MAX_LEN })
}

/// Verifies an inbound ASCII frame `$<body>*<checksum>`, with or without the trailing `\r\n`.
///
/// A checksum field made only of `X` characters means the sender disabled checksums and is
/// accepted as is.
///
/// # Arguments
///
/// * `frame`: The frame bytes, starting at `$`.
/// * `validation`: Which checksum widths are acceptable.
///
/// # Returns
///
/// The checksum width the frame carried, or [`VnError::ChecksumMismatch`] with both values
/// when the checksum is wrong. Malformed frames and widths `validation` rejects yield
/// [`VnError::InvalidFormat`].
pub fn verify_ascii_frame(frame: &[u8], validation: AsciiValidation) -> Result<ChecksumMode, VnError> {
    let frame = frame.strip_suffix(b"\r\n").unwrap_or(frame);
    if frame.first() != Some(&SYNC_CHAR) {
        return Err(VnError::InvalidFormat);
    }
    let star = frame
        .iter()
        .rposition(|b| *b == CHECKSUM_DELIMITER)
        .ok_or(VnError::InvalidFormat)?;
    let body = &frame[1..star];
    let digits = &frame[star + 1..];

    let mode = ChecksumMode::from_hex_digits(digits.len()).ok_or(VnError::InvalidFormat)?;
    if !validation.accepts(mode) {
        return Err(VnError::InvalidFormat);
    }
    if digits.iter().all(|b| *b == b'X') {
        return Ok(mode);
    }

    let text = core::str::from_utf8(digits).map_err(|_| VnError::InvalidFormat)?;
    let expected = u16::from_str_radix(text, 16).map_err(|_| VnError::InvalidFormat)?;
    let calculated = mode.compute(body);
    if expected == calculated {
        Ok(mode)
    } else {
        Err(VnError::ChecksumMismatch { expected, calculated })
    }
}

/// Checks a binary packet whose CRC trailer is appended big-endian.
///
/// `packet` is everything after the sync byte, trailer included; a valid packet leaves a zero
/// residue.
#[inline]
pub fn verify_packet_crc(packet: &[u8]) -> bool {
    packet.len() >= 2 && calculate_crc16(packet) == 0
}

/// Encodes the binary trailer for `data` (everything after the sync byte).
pub fn encode_packet_crc(data: &[u8]) -> [u8; 2] {
    calculate_crc16(data).to_be_bytes()
}
