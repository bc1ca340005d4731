// src/common/config.rs

use super::checksum::{AsciiValidation, ChecksumMode};
use super::timing;
use core::time::Duration;

/// Capacity of the raw byte buffer.
pub const DEFAULT_BYTE_BUFFER_CAPACITY: usize = 8192;
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_ASYNC_ERROR_QUEUE_CAPACITY: usize = 5;
pub const DEFAULT_MEASUREMENT_QUEUE_CAPACITY: usize = 50;
/// Bytes requested from the transport per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 512;

/// Runtime configuration for a sensor session and the stack underneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    pub byte_buffer_capacity: usize,
    /// Checksum appended to outbound commands.
    pub checksum_mode: ChecksumMode,
    /// Checksums accepted on inbound ASCII frames.
    pub ascii_validation: AsciiValidation,
    pub command_queue_capacity: usize,
    pub async_error_queue_capacity: usize,
    pub measurement_queue_capacity: usize,
    pub command_timeout: Duration,
    pub command_retries: u8,
    pub poll_interval: Duration,
    pub read_chunk_size: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            byte_buffer_capacity: DEFAULT_BYTE_BUFFER_CAPACITY,
            checksum_mode: ChecksumMode::default(),
            ascii_validation: AsciiValidation::default(),
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
            async_error_queue_capacity: DEFAULT_ASYNC_ERROR_QUEUE_CAPACITY,
            measurement_queue_capacity: DEFAULT_MEASUREMENT_QUEUE_CAPACITY,
            command_timeout: timing::COMMAND_RESPONSE_TIMEOUT,
            command_retries: timing::COMMAND_RETRIES,
            poll_interval: timing::RECEIVE_POLL_INTERVAL,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl SensorConfig {
    pub fn with_byte_buffer_capacity(mut self, capacity: usize) -> Self {
        self.byte_buffer_capacity = capacity;
        self
    }

    pub fn with_checksum_mode(mut self, mode: ChecksumMode) -> Self {
        self.checksum_mode = mode;
        self
    }

    pub fn with_ascii_validation(mut self, validation: AsciiValidation) -> Self {
        self.ascii_validation = validation;
        self
    }

    pub fn with_command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity;
        self
    }

    pub fn with_async_error_queue_capacity(mut self, capacity: usize) -> Self {
        self.async_error_queue_capacity = capacity;
        self
    }

    pub fn with_measurement_queue_capacity(mut self, capacity: usize) -> Self {
        self.measurement_queue_capacity = capacity;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_command_retries(mut self, retries: u8) -> Self {
        self.command_retries = retries;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }
}
