// src/command/async_error.rs

use core::fmt;
use core::time::Duration;

use crate::common::ascii::AsciiMessage;
use crate::common::error::SensorError;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AsyncErrorKind {
    /// Error frame not attributable to a pending command.
    Sensor(SensorError),
    /// Frame that matched no command and no consumer.
    UnexpectedMessage,
}

/// A device or protocol error that surfaced outside any command transaction.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AsyncError {
    pub kind: AsyncErrorKind,
    /// The offending frame as received, checksum included and line terminator stripped.
    pub message: AsciiMessage,
    pub timestamp: Duration,
}

impl AsyncError {
    pub fn new(kind: AsyncErrorKind, message: &str, timestamp: Duration) -> Self {
        let mut stored = AsciiMessage::new();
        // frames are bounded by the same limit, so only malformed input is cut short
        let _ = stored.try_push_str(truncate_to(message, stored.capacity()));
        AsyncError { kind, message: stored, timestamp }
    }

    /// Device error code, when the sensor reported one.
    pub fn code(&self) -> Option<u8> {
        match self.kind {
            AsyncErrorKind::Sensor(error) => Some(error.code()),
            AsyncErrorKind::UnexpectedMessage => None,
        }
    }
}

impl fmt::Display for AsyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AsyncErrorKind::Sensor(error) => write!(f, "sensor error {error}: {}", self.message),
            AsyncErrorKind::UnexpectedMessage => write!(f, "unexpected message: {}", self.message),
        }
    }
}

fn truncate_to(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
