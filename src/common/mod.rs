// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod ascii;
pub mod checksum;
pub mod config;
pub mod error;
pub mod hal_traits;
pub mod timing;

// --- Re-export key types/traits/functions for easier access ---

// From ascii.rs
pub use ascii::{AsciiHeader, AsciiMessage, ASCII_MESSAGE_MAX_LEN};

// From checksum.rs
pub use checksum::{
    append_checksum, calculate_checksum8, calculate_crc16, verify_ascii_frame, verify_packet_crc,
    AsciiValidation, ChecksumMode,
};

// From config.rs
pub use config::SensorConfig;

// From error.rs
pub use error::{SensorError, SessionError, VnError};

// From hal_traits.rs
pub use hal_traits::{Clock, StdClock, Transport};
