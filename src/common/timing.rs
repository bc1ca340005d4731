// src/common/timing.rs

use core::time::Duration;

// === Command/Response Timing ===

/// Time allowed for the sensor to answer a command before it counts as lost.
pub const COMMAND_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Time allowed for the transport to accept a whole outbound command.
pub const COMMAND_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Resends attempted by a blocking send after the first timeout.
pub const COMMAND_RETRIES: u8 = 2;

// === Receive loop ===

/// Sleep between receive passes when the transport has no more bytes.
pub const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Back-off while waiting for the transport to accept more outbound bytes.
pub const WRITE_RETRY_INTERVAL: Duration = Duration::from_micros(100);
