// src/common/ascii.rs

//! Fixed-size ASCII message type and the small string helpers used by the
//! command processor and the ASCII dispatcher.

use arrayvec::ArrayString;

/// Longest ASCII frame the sensor emits or accepts, terminator included.
pub const ASCII_MESSAGE_MAX_LEN: usize = 256;

/// Longest header token (`VNYPR`, `VNRRG`, ...) tracked for subscriptions.
pub const ASCII_HEADER_MAX_LEN: usize = 16;

pub type AsciiMessage = ArrayString<ASCII_MESSAGE_MAX_LEN>;
pub type AsciiHeader = ArrayString<ASCII_HEADER_MAX_LEN>;

pub const SYNC_CHAR: u8 = b'$';
pub const CHECKSUM_DELIMITER: u8 = b'*';
pub const FIELD_SEPARATOR: char = ',';
pub const COMMAND_PREFIX: &str = "$VN";
pub const ERROR_HEADER: &str = "VNERR";

/// Text between `$` and `*` (both excluded). Falls back to the end of the message when no
/// `*` is present.
pub fn body(message: &str) -> &str {
    let without_sync = message.strip_prefix('$').unwrap_or(message);
    match without_sync.find('*') {
        Some(end) => &without_sync[..end],
        None => without_sync.trim_end_matches(['\r', '\n']),
    }
}

/// Header token: the body up to the first field separator.
pub fn header(message: &str) -> &str {
    let body = body(message);
    body.split(FIELD_SEPARATOR).next().unwrap_or(body)
}

/// Comma separated fields after the header token.
pub fn fields(message: &str) -> impl Iterator<Item = &str> {
    body(message).split(FIELD_SEPARATOR).skip(1)
}

/// Returns the text strictly between the first `start` and the next `end` after it.
pub fn extract_between(text: &str, start: char, end: char) -> Option<&str> {
    let from = text.find(start)? + start.len_utf8();
    let len = text[from..].find(end)?;
    Some(&text[from..from + len])
}

/// Parses a hexadecimal byte, accepting one or two digits.
pub fn parse_hex_u8(text: &str) -> Option<u8> {
    if text.is_empty() || text.len() > 2 {
        return None;
    }
    u8::from_str_radix(text, 16).ok()
}

/// Builds an [`AsciiMessage`] from a string, failing when it does not fit.
pub fn to_message(text: &str) -> Option<AsciiMessage> {
    AsciiMessage::from(text).ok()
}
