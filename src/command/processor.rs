// src/command/processor.rs

use core::fmt::Write;
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, trace, warn};
use parking_lot::Mutex;

use super::async_error::{AsyncError, AsyncErrorKind};
use super::command::Command;
use crate::common::ascii::{self, AsciiMessage, ASCII_MESSAGE_MAX_LEN, ERROR_HEADER};
use crate::common::checksum::{append_checksum, ChecksumMode};
use crate::common::config::SensorConfig;
use crate::common::error::{SensorError, VnError};

/// How an inbound ASCII frame was consumed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResponseMatch {
    /// A pending command received its response.
    Matched,
    /// The oldest pending command was answered with an error frame.
    Errored(SensorError),
    /// Nothing was waiting for the frame.
    Unmatched,
}

/// Tracks in-flight commands and correlates inbound responses with them.
///
/// Shared between the receive context (which feeds responses) and the application context
/// (which registers commands), so all state sits behind a mutex or a channel.
#[derive(Debug)]
pub struct CommandProcessor {
    queue: Mutex<VecDeque<Weak<Command>>>,
    capacity: usize,
    checksum_mode: ChecksumMode,
    async_errors: Sender<AsyncError>,
}

impl CommandProcessor {
    /// Returns the processor and the receiving end of its async error queue.
    pub fn new(config: &SensorConfig) -> (Self, Receiver<AsyncError>) {
        let (tx, rx) = crossbeam_channel::bounded(config.async_error_queue_capacity);
        let processor = CommandProcessor {
            queue: Mutex::new(VecDeque::with_capacity(config.command_queue_capacity)),
            capacity: config.command_queue_capacity,
            checksum_mode: config.checksum_mode,
            async_errors: tx,
        };
        (processor, rx)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn checksum_mode(&self) -> ChecksumMode {
        self.checksum_mode
    }

    /// Queues `command` and returns the framed bytes to write.
    ///
    /// Entries whose command was dropped or already finished are purged before the capacity
    /// check.
    ///
    /// # Arguments
    ///
    /// * `command`: The command to track. The processor keeps only a weak reference.
    /// * `now`: Send time, recorded on the command for timeout tracking.
    ///
    /// # Returns
    ///
    /// `$VN<command>*<checksum>\r\n` in the configured checksum mode.
    ///
    /// # Errors
    ///
    /// [`VnError::CommandResent`] if the command is already awaiting a response and
    /// [`VnError::CommandQueueFull`] when the queue is at capacity.
    pub fn register_command(&self, command: &Arc<Command>, now: Duration) -> Result<AsciiMessage, VnError> {
        let mut queue = self.queue.lock();
        if command.is_awaiting_response() {
            return Err(VnError::CommandResent);
        }
        queue.retain(|entry| entry.upgrade().is_some_and(|c| c.is_awaiting_response()));
        if queue.len() >= self.capacity {
            return Err(VnError::CommandQueueFull);
        }

        let mut message = AsciiMessage::new();
        write!(message, "{}{}", ascii::COMMAND_PREFIX, command.command())
            .map_err(|_| VnError::MessageTooLong { max: ASCII_MESSAGE_MAX_LEN })?;
        append_checksum(&mut message, self.checksum_mode)?;

        command.prepare_to_send(now);
        queue.push_back(Arc::downgrade(command));
        debug!("TX {}", message.trim_end());
        Ok(message)
    }

    /// Routes an inbound ASCII frame to the command it answers.
    ///
    /// Responses complete the oldest pending command whose match key they carry; entries queued
    /// ahead of it are dropped. `VNERR` frames of the command-response class fail the oldest
    /// pending command, other error codes are reported asynchronously.
    ///
    /// # Arguments
    ///
    /// * `message`: The frame text. It may still carry its `$` and checksum.
    /// * `timestamp`: Receive time, recorded on the command or the async error.
    ///
    /// # Returns
    ///
    /// How the frame was consumed. A frame nothing claims is pushed onto the async error queue
    /// and reported as [`ResponseMatch::Unmatched`].
    pub fn match_response(&self, message: &str, timestamp: Duration) -> ResponseMatch {
        self.route(message, timestamp, true)
    }

    /// Like [`CommandProcessor::match_response`], for a frame a subscriber already received.
    ///
    /// An unclaimed response is dropped instead of becoming an async error; error frames are
    /// routed as usual.
    pub fn match_consumed_response(&self, message: &str, timestamp: Duration) -> ResponseMatch {
        self.route(message, timestamp, false)
    }

    fn route(&self, message: &str, timestamp: Duration, report_unmatched: bool) -> ResponseMatch {
        if ascii::header(message) == ERROR_HEADER {
            return self.match_error(message, timestamp);
        }

        let body = ascii::body(message);
        let mut queue = self.queue.lock();
        let position = queue
            .iter()
            .position(|entry| entry.upgrade().is_some_and(|c| c.is_awaiting_response() && c.matches(body)));

        if let Some(idx) = position {
            // older entries were skipped by the sensor; their owners time out on their own
            let matched = queue.drain(..=idx).last().and_then(|entry| entry.upgrade());
            // settled under the queue lock so a timeout and re-registration cannot interleave
            if let Some(command) = matched.filter(|c| c.complete(body, timestamp)) {
                debug!("RX {} matched {}", body, command.command());
                return ResponseMatch::Matched;
            }
        }
        drop(queue);

        if report_unmatched {
            self.push_async_error(AsyncErrorKind::UnexpectedMessage, message, timestamp);
        } else {
            trace!("RX {} consumed by subscribers only", body);
        }
        ResponseMatch::Unmatched
    }

    fn match_error(&self, message: &str, timestamp: Duration) -> ResponseMatch {
        let Some(code) = ascii::fields(message).next().and_then(ascii::parse_hex_u8) else {
            self.push_async_error(AsyncErrorKind::UnexpectedMessage, message, timestamp);
            return ResponseMatch::Unmatched;
        };
        let error = SensorError::from_code(code);

        if error.is_command_response() {
            let mut queue = self.queue.lock();
            while let Some(entry) = queue.pop_front() {
                if let Some(command) = entry.upgrade().filter(|c| c.set_error(error, timestamp)) {
                    debug!("RX error {} for {}", error, command.command());
                    return ResponseMatch::Errored(error);
                }
            }
        }

        self.push_async_error(AsyncErrorKind::Sensor(error), message, timestamp);
        ResponseMatch::Unmatched
    }

    fn push_async_error(&self, kind: AsyncErrorKind, message: &str, timestamp: Duration) {
        match self.async_errors.try_send(AsyncError::new(kind, message, timestamp)) {
            Ok(()) => {}
            Err(TrySendError::Full(e)) => warn!("async error queue full, dropping: {e}"),
            Err(TrySendError::Disconnected(_)) => debug!("async error queue closed"),
        }
    }

    /// Removes the most recently registered command, used to undo a registration whose bytes
    /// never reached the transport.
    pub fn pop_command_from_back(&self) -> Option<Arc<Command>> {
        self.queue.lock().pop_back().and_then(|entry| entry.upgrade())
    }

    /// Outstanding entries, including ones not yet purged.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Oldest command still waiting for a response.
    pub fn front_command(&self) -> Option<Arc<Command>> {
        self.queue
            .lock()
            .iter()
            .filter_map(|entry| entry.upgrade())
            .find(|c| c.is_awaiting_response())
    }

    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}
