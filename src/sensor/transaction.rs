// src/sensor/transaction.rs

use core::fmt::Debug;
use core::time::Duration;
use std::sync::Arc;

use log::{debug, warn};

use super::Sensor;
use crate::command::{Command, CommandState};
use crate::common::{
    error::{SessionError, VnError},
    hal_traits::{Clock, Transport},
    timing,
};
use crate::register::Register;

/// How long [`Sensor::send_command`] waits for the response.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum SendCommandBlockMode {
    /// Write and return; the outcome shows up on the command once the response is polled in.
    None,
    /// Wait for one response or timeout.
    Block,
    /// Wait, resending after each timeout up to the configured retry count.
    #[default]
    BlockWithRetry,
}

impl<T, C> Sensor<T, C>
where
    T: Transport,
    T::Error: Debug,
    C: Clock,
{
    /// Sends `command` and, unless `mode` is [`SendCommandBlockMode::None`], polls the
    /// transport until it is answered.
    ///
    /// # Arguments
    ///
    /// * `command`: The command to send. Its state and response are updated in place.
    /// * `mode`: [`SendCommandBlockMode::None`] returns once the bytes are written,
    ///   [`SendCommandBlockMode::Block`] waits one response timeout, and
    ///   [`SendCommandBlockMode::BlockWithRetry`] resends up to the configured retry count.
    ///
    /// # Returns
    ///
    /// `Ok(())` once the command is written (non-blocking) or answered. A sensor error frame
    /// for the command is returned as [`VnError::Sensor`]; running out of attempts is
    /// [`VnError::ResponseTimeout`], and transport failures surface as [`SessionError::Io`].
    pub fn send_command(
        &mut self,
        command: &Arc<Command>,
        mode: SendCommandBlockMode,
    ) -> Result<(), SessionError<T::Error>> {
        let attempts = match mode {
            SendCommandBlockMode::BlockWithRetry => 1 + usize::from(self.config.command_retries),
            _ => 1,
        };

        for attempt in 1..=attempts {
            self.issue(command)?;
            if mode == SendCommandBlockMode::None {
                return Ok(());
            }

            match self.await_response(command)? {
                CommandState::Matched => return Ok(()),
                CommandState::Errored(e) => return Err(VnError::Sensor(e).into()),
                _ => {
                    command.mark_timed_out();
                    debug!("{} timed out (attempt {}/{})", command.command(), attempt, attempts);
                }
            }
        }

        warn!("no response to {} after {} attempts", command.command(), attempts);
        Err(VnError::ResponseTimeout.into())
    }

    /// Reads a register and parses the response.
    pub fn read_register(&mut self, id: u8) -> Result<Register, SessionError<T::Error>> {
        let command = Arc::new(Register::read_command(id)?);
        self.send_command(&command, SendCommandBlockMode::BlockWithRetry)?;
        let body = command.response().ok_or(VnError::InvalidRegisterValue(id))?;
        Ok(Register::from_response(id, &body)?)
    }

    /// Writes a register, returning the configuration the sensor echoed back.
    pub fn write_register(&mut self, register: &Register) -> Result<Register, SessionError<T::Error>> {
        let command = Arc::new(register.to_write_command()?);
        self.send_command(&command, SendCommandBlockMode::BlockWithRetry)?;
        let body = command.response().ok_or(VnError::InvalidRegisterValue(register.id()))?;
        let echoed = Register::from_response(register.id(), &body)?;
        if !register.is_config_equal(&echoed)? {
            warn!("{} write echoed a different value: {:?}", register.name(), echoed);
        }
        Ok(echoed)
    }

    /// Registers the command and writes its framed text.
    ///
    /// A failed write takes the command back off the processor queue and returns it to idle.
    fn issue(&mut self, command: &Arc<Command>) -> Result<(), SessionError<T::Error>> {
        let now = self.clock.now();
        let message = self.processor.register_command(command, now)?;

        if let Err(e) = self.write_all(message.as_bytes()) {
            self.processor.pop_command_from_back();
            command.reset();
            return Err(e);
        }
        Ok(())
    }

    /// Polls until the command leaves `AwaitingResponse` or its deadline passes.
    fn await_response(&mut self, command: &Command) -> Result<CommandState, SessionError<T::Error>> {
        let sent_at = command.sent_at().unwrap_or_else(|| self.clock.now());
        let deadline = sent_at + self.config.command_timeout;

        loop {
            self.poll()?;
            let state = command.state();
            if state != CommandState::AwaitingResponse || self.clock.now() >= deadline {
                return Ok(state);
            }
            self.clock.sleep(self.config.poll_interval);
        }
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), SessionError<T::Error>> {
        while !bytes.is_empty() {
            let written = self.execute_blocking_io_with_timeout(timing::COMMAND_WRITE_TIMEOUT, |transport| {
                match transport.write(bytes) {
                    Ok(0) => Err(nb::Error::WouldBlock),
                    other => other,
                }
            })?;
            bytes = &bytes[written.min(bytes.len())..];
        }
        Ok(())
    }

    /// Repeats a non-blocking transport operation until it stops returning `WouldBlock`.
    fn execute_blocking_io_with_timeout<F, R>(
        &mut self,
        timeout: Duration,
        mut f: F,
    ) -> Result<R, SessionError<T::Error>>
    where
        F: FnMut(&mut T) -> nb::Result<R, T::Error>,
    {
        let deadline = self.clock.now() + timeout;
        loop {
            match f(&mut self.transport) {
                Ok(result) => return Ok(result),
                Err(nb::Error::WouldBlock) => {
                    if self.clock.now() >= deadline {
                        return Err(VnError::WriteTimeout.into());
                    }
                    self.clock.sleep(timing::WRITE_RETRY_INTERVAL);
                }
                Err(nb::Error::Other(e)) => return Err(SessionError::Io(e)),
            }
        }
    }
}
