// src/common/error.rs

use core::fmt::Debug;

/// Errors raised by the protocol stack itself (no transport involved).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VnError {
    /// The byte buffer cannot take the write without overwriting unread data.
    #[error("Byte buffer full: needed {needed}, available {available}")]
    BufferFull { needed: usize, available: usize },

    /// The command processor already tracks as many commands as it can hold.
    #[error("Command queue full")]
    CommandQueueFull,

    /// The command is still waiting for a response from a previous send.
    #[error("Command already awaiting a response")]
    CommandResent,

    /// No response arrived before the deadline (after all retries).
    #[error("Timed out waiting for a response")]
    ResponseTimeout,

    /// The transport kept refusing bytes until the write deadline.
    #[error("Timed out writing to the transport")]
    WriteTimeout,

    /// The sensor answered the command with an error frame.
    #[error("Sensor error: {0}")]
    Sensor(SensorError),

    /// Received checksum does not match the calculated one.
    #[error("Checksum mismatch: expected {expected:#06x}, calculated {calculated:#06x}")]
    ChecksumMismatch { expected: u16, calculated: u16 },

    /// Message or field layout does not follow the wire format.
    #[error("Invalid format")]
    InvalidFormat,

    /// Formatted message does not fit in an ASCII message buffer.
    #[error("Message exceeds {max} bytes")]
    MessageTooLong { max: usize },

    /// The register id is not part of the catalog.
    #[error("Unknown register id {0}")]
    UnknownRegister(u8),

    /// Attempted to write a read-only register.
    #[error("Register {0} is read-only")]
    ReadOnlyRegister(u8),

    /// Two registers with different ids were compared.
    #[error("Cannot compare register {left} with register {right}")]
    RegisterMismatch { left: u8, right: u8 },

    /// A response arrived but its content does not fit the register layout.
    #[error("Invalid value for register {0}")]
    InvalidRegisterValue(u8),

    /// Subscriber list has no free slot.
    #[error("Subscriber list full")]
    SubscriberListFull,
}

/// Errors raised by a [`crate::sensor::Sensor`] session, which adds the transport's own error type.
#[derive(Debug, thiserror::Error)]
pub enum SessionError<E>
where
    E: Debug,
{
    /// Underlying I/O error from the transport implementation.
    #[error("I/O error: {0:?}")]
    Io(E),

    #[error(transparent)]
    Protocol(#[from] VnError),
}

impl<E: Debug> SessionError<E> {
    /// Returns the protocol error, if this is not a transport failure.
    pub fn protocol(&self) -> Option<&VnError> {
        match self {
            SessionError::Protocol(e) => Some(e),
            SessionError::Io(_) => None,
        }
    }
}

/// Error codes reported by the sensor in `$VNERR` frames.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum SensorError {
    #[error("hard fault")]
    HardFault,
    #[error("serial buffer overflow")]
    SerialBufferOverflow,
    #[error("invalid checksum")]
    InvalidChecksum,
    #[error("invalid command")]
    InvalidCommand,
    #[error("not enough parameters")]
    NotEnoughParameters,
    #[error("too many parameters")]
    TooManyParameters,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("invalid register")]
    InvalidRegister,
    #[error("unauthorized access")]
    UnauthorizedAccess,
    #[error("watchdog reset")]
    WatchdogReset,
    #[error("output buffer overflow")]
    OutputBufferOverflow,
    #[error("insufficient baud rate")]
    InsufficientBaudRate,
    #[error("error buffer overflow")]
    ErrorBufferOverflow,
    #[error("unknown error code {0:#04x}")]
    Unknown(u8),
}

impl SensorError {
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => SensorError::HardFault,
            2 => SensorError::SerialBufferOverflow,
            3 => SensorError::InvalidChecksum,
            4 => SensorError::InvalidCommand,
            5 => SensorError::NotEnoughParameters,
            6 => SensorError::TooManyParameters,
            7 => SensorError::InvalidParameter,
            8 => SensorError::InvalidRegister,
            9 => SensorError::UnauthorizedAccess,
            10 => SensorError::WatchdogReset,
            11 => SensorError::OutputBufferOverflow,
            12 => SensorError::InsufficientBaudRate,
            255 => SensorError::ErrorBufferOverflow,
            other => SensorError::Unknown(other),
        }
    }

    pub const fn code(&self) -> u8 {
        match self {
            SensorError::HardFault => 1,
            SensorError::SerialBufferOverflow => 2,
            SensorError::InvalidChecksum => 3,
            SensorError::InvalidCommand => 4,
            SensorError::NotEnoughParameters => 5,
            SensorError::TooManyParameters => 6,
            SensorError::InvalidParameter => 7,
            SensorError::InvalidRegister => 8,
            SensorError::UnauthorizedAccess => 9,
            SensorError::WatchdogReset => 10,
            SensorError::OutputBufferOverflow => 11,
            SensorError::InsufficientBaudRate => 12,
            SensorError::ErrorBufferOverflow => 255,
            SensorError::Unknown(code) => *code,
        }
    }

    /// True for errors the sensor only emits in reply to a command.
    ///
    /// Faults, resets and buffer overflows are raised on the sensor's own schedule and are
    /// never attributed to the oldest outstanding command.
    pub const fn is_command_response(&self) -> bool {
        matches!(
            self,
            SensorError::InvalidChecksum
                | SensorError::InvalidCommand
                | SensorError::NotEnoughParameters
                | SensorError::TooManyParameters
                | SensorError::InvalidParameter
                | SensorError::InvalidRegister
                | SensorError::UnauthorizedAccess
                | SensorError::InsufficientBaudRate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_codes_round_trip_known_values() {
        for code in (1u8..=12).chain(core::iter::once(255)) {
            let err = SensorError::from_code(code);
            assert!(!matches!(err, SensorError::Unknown(_)), "code {code} should be known");
            assert_eq!(err.code(), code);
        }
        assert_eq!(SensorError::from_code(0x42), SensorError::Unknown(0x42));
        assert_eq!(SensorError::Unknown(0x42).code(), 0x42);
    }

    #[test]
    fn test_command_response_classification() {
        assert!(SensorError::InvalidChecksum.is_command_response());
        assert!(SensorError::InvalidRegister.is_command_response());
        assert!(!SensorError::WatchdogReset.is_command_response());
        assert!(!SensorError::HardFault.is_command_response());
        assert!(!SensorError::Unknown(99).is_command_response());
    }

    #[test]
    fn test_session_error_wraps_protocol_errors() {
        let err: SessionError<()> = VnError::CommandQueueFull.into();
        assert_eq!(err.protocol(), Some(&VnError::CommandQueueFull));
        let io: SessionError<&str> = SessionError::Io("port closed");
        assert!(io.protocol().is_none());
        assert_eq!(io.to_string(), "I/O error: \"port closed\"");
    }
}
