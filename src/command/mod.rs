// src/command/mod.rs

//! ASCII command transactions and their correlation with inbound responses.

pub mod async_error;
pub mod command;
pub mod processor;

pub use async_error::{AsyncError, AsyncErrorKind};
pub use command::{Command, CommandState, MatchKey};
pub use processor::{CommandProcessor, ResponseMatch};
