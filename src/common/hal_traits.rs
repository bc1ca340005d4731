// src/common/hal_traits.rs

use core::fmt::Debug;
use core::time::Duration;

/// Abstraction for the byte transport (serial port, SPI bridge, file replay...).
///
/// Opening the port and configuring the baud rate happen outside this crate; the stack only
/// ever reads whatever bytes are available and writes framed commands.
pub trait Transport {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Reads the bytes currently available into `buf`.
    ///
    /// Returns `Ok(n)` with the number of bytes copied, or `Err(nb::Error::WouldBlock)` if
    /// nothing is available yet. Other errors are returned as `Err(nb::Error::Other(Self::Error))`.
    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error>;

    /// Attempts to write `bytes`.
    ///
    /// Returns the number of bytes accepted, or `Err(nb::Error::WouldBlock)` if the transmit
    /// buffer is full.
    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, Self::Error>;
}

/// Time source and sleep used by the receive loop and the command timeout logic.
///
/// Timestamps are monotonic offsets from an arbitrary epoch chosen by the clock.
pub trait Clock {
    fn now(&self) -> Duration;

    /// Suspends the caller for at least `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// [`Clock`] backed by `std::time::Instant` and `std::thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    epoch: std::time::Instant,
}

impl StdClock {
    pub fn new() -> Self {
        StdClock { epoch: std::time::Instant::now() }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_clock_is_monotonic() {
        let mut clock = StdClock::new();
        let first = clock.now();
        clock.sleep(Duration::from_millis(2));
        let second = clock.now();
        assert!(second >= first + Duration::from_millis(2));
    }
}
