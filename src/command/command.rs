// src/command/command.rs

use core::fmt::Write;
use core::time::Duration;

use arrayvec::ArrayString;
use parking_lot::Mutex;

use crate::common::ascii::{self, AsciiMessage, FIELD_SEPARATOR};
use crate::common::error::{SensorError, VnError};

/// Longest match key a command can carry.
pub const MATCH_KEY_MAX_LEN: usize = 16;

pub type MatchKey = ArrayString<MATCH_KEY_MAX_LEN>;

/// Lifecycle of a command transaction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandState {
    Idle,
    AwaitingResponse,
    Matched,
    Errored(SensorError),
    TimedOut,
}

#[derive(Debug)]
struct CommandInner {
    state: CommandState,
    response: Option<AsciiMessage>,
    sent_at: Option<Duration>,
    responded_at: Option<Duration>,
}

/// An ASCII command and the state of its request/response transaction.
///
/// Shared through an `Arc`: the application keeps the strong reference and the command
/// processor holds a weak one while the command is in flight.
#[derive(Debug)]
pub struct Command {
    command: AsciiMessage,
    match_key: MatchKey,
    inner: Mutex<CommandInner>,
}

impl Command {
    /// A command whose response is identified by its header token (`"WNV"` for `"WNV"`,
    /// `"ASY"` for `"ASY,1"`).
    pub fn new(command: &str) -> Result<Self, VnError> {
        let key = command.split(FIELD_SEPARATOR).next().unwrap_or(command);
        Self::with_match_key(command, key)
    }

    pub fn with_match_key(command: &str, match_key: &str) -> Result<Self, VnError> {
        if command.is_empty() {
            return Err(VnError::InvalidFormat);
        }
        let command = AsciiMessage::from(command)
            .map_err(|_| VnError::MessageTooLong { max: ascii::ASCII_MESSAGE_MAX_LEN })?;
        let match_key = MatchKey::from(match_key)
            .map_err(|_| VnError::MessageTooLong { max: MATCH_KEY_MAX_LEN })?;
        Ok(Command {
            command,
            match_key,
            inner: Mutex::new(CommandInner {
                state: CommandState::Idle,
                response: None,
                sent_at: None,
                responded_at: None,
            }),
        })
    }

    /// `RRG,<id>`; answered by `VNRRG,<id>,<values>`.
    pub fn read_register(id: u8) -> Self {
        let text = register_prefix("RRG", id);
        Self::infallible(&text, &text)
    }

    /// `WRG,<id>,<values>`; answered by `VNWRG,<id>,<values>`.
    pub fn write_register(id: u8, values: &str) -> Result<Self, VnError> {
        let key = register_prefix("WRG", id);
        let mut text = AsciiMessage::new();
        write!(text, "{key},{values}")
            .map_err(|_| VnError::MessageTooLong { max: ascii::ASCII_MESSAGE_MAX_LEN })?;
        Self::with_match_key(&text, &key)
    }

    /// Persists the active configuration (`WNV`).
    pub fn write_settings() -> Self {
        Self::infallible("WNV", "WNV")
    }

    pub fn restore_factory_settings() -> Self {
        Self::infallible("RFS", "RFS")
    }

    /// Reboots the sensor (`RST`).
    pub fn reset_sensor() -> Self {
        Self::infallible("RST", "RST")
    }

    pub fn async_output_enable(enable: bool) -> Self {
        Self::infallible(if enable { "ASY,1" } else { "ASY,0" }, "ASY")
    }

    pub fn known_magnetic_disturbance(present: bool) -> Self {
        Self::infallible(if present { "KMD,1" } else { "KMD,0" }, "KMD")
    }

    pub fn known_acceleration_disturbance(present: bool) -> Self {
        Self::infallible(if present { "KAD,1" } else { "KAD,0" }, "KAD")
    }

    /// Seeds the heading estimate, in degrees.
    pub fn set_initial_heading(heading: f32) -> Self {
        let mut text = AsciiMessage::new();
        // "SIH,+123.456"; even f32::MAX renders in under 50 chars, so the write cannot overflow
        let _ = write!(text, "SIH,{:+08.3}", heading);
        Self::infallible(&text, "SIH")
    }

    /// For built-in commands that always fit.
    fn infallible(command: &str, key: &str) -> Self {
        Command {
            command: AsciiMessage::from(command).unwrap_or_default(),
            match_key: MatchKey::from(key).unwrap_or_default(),
            inner: Mutex::new(CommandInner {
                state: CommandState::Idle,
                response: None,
                sent_at: None,
                responded_at: None,
            }),
        }
    }

    /// Command text without the `$VN` prefix and checksum.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn match_key(&self) -> &str {
        &self.match_key
    }

    pub fn state(&self) -> CommandState {
        self.inner.lock().state
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.state() == CommandState::AwaitingResponse
    }

    /// Response body after the header token, e.g. `"05,115200"` for a baud rate read.
    pub fn response(&self) -> Option<AsciiMessage> {
        self.inner.lock().response
    }

    pub fn error(&self) -> Option<SensorError> {
        match self.state() {
            CommandState::Errored(e) => Some(e),
            _ => None,
        }
    }

    pub fn sent_at(&self) -> Option<Duration> {
        self.inner.lock().sent_at
    }

    pub fn responded_at(&self) -> Option<Duration> {
        self.inner.lock().responded_at
    }

    /// Moves an awaiting command to `TimedOut`; other states are left alone.
    pub fn mark_timed_out(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CommandState::AwaitingResponse {
            inner.state = CommandState::TimedOut;
        }
    }

    /// Returns the command to `Idle`, dropping any previous outcome.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CommandState::Idle;
        inner.response = None;
        inner.sent_at = None;
        inner.responded_at = None;
    }

    /// True when `body` (`VN...`, no `$` or checksum) answers this command.
    pub fn matches(&self, body: &str) -> bool {
        body.strip_prefix("VN")
            .and_then(|rest| rest.strip_prefix(self.match_key.as_str()))
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(FIELD_SEPARATOR))
    }

    pub(crate) fn prepare_to_send(&self, now: Duration) {
        let mut inner = self.inner.lock();
        inner.state = CommandState::AwaitingResponse;
        inner.response = None;
        inner.sent_at = Some(now);
        inner.responded_at = None;
    }

    /// Records the response to the current attempt.
    ///
    /// Returns `false`, leaving the command untouched, when it is no longer awaiting a response
    /// (timed out, reset, or already answered).
    pub(crate) fn complete(&self, body: &str, timestamp: Duration) -> bool {
        let captured = body.split_once(FIELD_SEPARATOR).map_or("", |(_, rest)| rest);
        let mut inner = self.inner.lock();
        if inner.state != CommandState::AwaitingResponse {
            return false;
        }
        inner.state = CommandState::Matched;
        inner.response = AsciiMessage::from(captured).ok();
        inner.responded_at = Some(timestamp);
        true
    }

    /// Like [`Command::complete`], for an error frame.
    pub(crate) fn set_error(&self, error: SensorError, timestamp: Duration) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CommandState::AwaitingResponse {
            return false;
        }
        inner.state = CommandState::Errored(error);
        inner.responded_at = Some(timestamp);
        true
    }
}

fn register_prefix(verb: &str, id: u8) -> MatchKey {
    let mut key = MatchKey::new();
    // "RRG,255" is well under the key limit, so the write cannot fail
    let _ = write!(key, "{verb},{id:02}");
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_keys() {
        assert_eq!(Command::read_register(5).command(), "RRG,05");
        assert_eq!(Command::read_register(5).match_key(), "RRG,05");
        assert_eq!(Command::read_register(75).command(), "RRG,75");

        let write = Command::write_register(5, "115200").unwrap();
        assert_eq!(write.command(), "WRG,05,115200");
        assert_eq!(write.match_key(), "WRG,05");

        assert_eq!(Command::new("ASY,1").unwrap().match_key(), "ASY");
        assert_eq!(Command::async_output_enable(false).command(), "ASY,0");
        assert_eq!(Command::set_initial_heading(12.5).command(), "SIH,+012.500");
        assert!(Command::new("").is_err());
        assert_eq!(Command::reset_sensor().match_key(), "RST");
    }

    #[test]
    fn test_matches() {
        let cmd = Command::read_register(5);
        assert!(cmd.matches("VNRRG,05,115200"));
        assert!(!cmd.matches("VNRRG,050,1"));
        assert!(!cmd.matches("VNRRG,06,1"));
        assert!(!cmd.matches("RRG,05,115200"));

        let wnv = Command::write_settings();
        assert!(wnv.matches("VNWNV"));
        assert!(!wnv.matches("VNWNVX"));
    }

    #[test]
    fn test_lifecycle() {
        let cmd = Command::read_register(5);
        assert_eq!(cmd.state(), CommandState::Idle);

        cmd.prepare_to_send(Duration::from_millis(10));
        assert!(cmd.is_awaiting_response());
        assert_eq!(cmd.sent_at(), Some(Duration::from_millis(10)));

        assert!(cmd.complete("VNRRG,05,115200", Duration::from_millis(12)));
        assert_eq!(cmd.state(), CommandState::Matched);
        assert_eq!(cmd.response().unwrap().as_str(), "05,115200");
        assert_eq!(cmd.responded_at(), Some(Duration::from_millis(12)));

        // only an awaiting command can time out
        cmd.mark_timed_out();
        assert_eq!(cmd.state(), CommandState::Matched);

        cmd.prepare_to_send(Duration::from_millis(20));
        cmd.mark_timed_out();
        assert_eq!(cmd.state(), CommandState::TimedOut);
        assert_eq!(cmd.response(), None);

        cmd.prepare_to_send(Duration::from_millis(30));
        assert!(cmd.set_error(SensorError::InvalidRegister, Duration::from_millis(31)));
        assert_eq!(cmd.error(), Some(SensorError::InvalidRegister));

        cmd.reset();
        assert_eq!(cmd.state(), CommandState::Idle);
        assert_eq!(cmd.sent_at(), None);
    }

    #[test]
    fn test_late_outcome_keeps_timeout() {
        let cmd = Command::read_register(5);
        cmd.prepare_to_send(Duration::ZERO);
        cmd.mark_timed_out();

        assert!(!cmd.complete("VNRRG,05,115200", Duration::from_millis(5)));
        assert_eq!(cmd.state(), CommandState::TimedOut);
        assert_eq!(cmd.response(), None);
        assert_eq!(cmd.responded_at(), None);

        assert!(!cmd.set_error(SensorError::InvalidRegister, Duration::from_millis(6)));
        assert_eq!(cmd.state(), CommandState::TimedOut);

        // an answered command cannot be answered twice
        cmd.prepare_to_send(Duration::from_millis(10));
        assert!(cmd.complete("VNRRG,05,9600", Duration::from_millis(11)));
        assert!(!cmd.complete("VNRRG,05,115200", Duration::from_millis(12)));
        assert_eq!(cmd.response().unwrap().as_str(), "05,9600");
    }
}
