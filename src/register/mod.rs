// src/register/mod.rs

//! A slice of the sensor's register catalog: each register is an id plus a serializer.

use core::fmt::Write;

use arrayvec::ArrayString;

use crate::command::Command;
use crate::common::ascii::{AsciiMessage, ASCII_MESSAGE_MAX_LEN, FIELD_SEPARATOR};
use crate::common::error::VnError;
use crate::measurement::Ypr;

pub mod binary_output;

pub use binary_output::BinaryOutput;

pub type RegisterText = ArrayString<24>;

/// Static metadata for one register id.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegisterInfo {
    pub id: u8,
    pub name: &'static str,
    pub writable: bool,
}

pub static REGISTER_TABLE: [RegisterInfo; 12] = [
    RegisterInfo { id: 0, name: "UserTag", writable: true },
    RegisterInfo { id: 1, name: "Model", writable: false },
    RegisterInfo { id: 2, name: "HardwareVersion", writable: false },
    RegisterInfo { id: 3, name: "SerialNumber", writable: false },
    RegisterInfo { id: 4, name: "FirmwareVersion", writable: false },
    RegisterInfo { id: 5, name: "BaudRate", writable: true },
    RegisterInfo { id: 6, name: "AsyncDataOutputType", writable: true },
    RegisterInfo { id: 7, name: "AsyncDataOutputFreq", writable: true },
    RegisterInfo { id: 8, name: "YawPitchRoll", writable: false },
    RegisterInfo { id: 75, name: "BinaryOutput1", writable: true },
    RegisterInfo { id: 76, name: "BinaryOutput2", writable: true },
    RegisterInfo { id: 77, name: "BinaryOutput3", writable: true },
];

pub fn register_info(id: u8) -> Option<&'static RegisterInfo> {
    REGISTER_TABLE.iter().find(|info| info.id == id)
}

/// Serial port selector shared by the port-scoped configuration registers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PortValue {
    pub value: u32,
    /// `None` addresses the port the command arrived on.
    pub serial_port: Option<u8>,
}

impl PortValue {
    pub fn new(value: u32) -> Self {
        PortValue { value, serial_port: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Register {
    UserTag(RegisterText),
    Model(RegisterText),
    HardwareVersion(u32),
    SerialNumber(u32),
    FirmwareVersion(RegisterText),
    BaudRate(PortValue),
    /// Asynchronous ASCII output selector (0 = off, 1 = YPR, 14 = YMR, ...).
    AsyncDataOutputType(PortValue),
    /// Asynchronous output rate in Hz.
    AsyncDataOutputFreq(PortValue),
    YawPitchRoll(Ypr),
    BinaryOutput1(BinaryOutput),
    BinaryOutput2(BinaryOutput),
    BinaryOutput3(BinaryOutput),
}

impl Register {
    pub fn id(&self) -> u8 {
        match self {
            Register::UserTag(_) => 0,
            Register::Model(_) => 1,
            Register::HardwareVersion(_) => 2,
            Register::SerialNumber(_) => 3,
            Register::FirmwareVersion(_) => 4,
            Register::BaudRate(_) => 5,
            Register::AsyncDataOutputType(_) => 6,
            Register::AsyncDataOutputFreq(_) => 7,
            Register::YawPitchRoll(_) => 8,
            Register::BinaryOutput1(_) => 75,
            Register::BinaryOutput2(_) => 76,
            Register::BinaryOutput3(_) => 77,
        }
    }

    pub fn name(&self) -> &'static str {
        register_info(self.id()).map_or("Unknown", |info| info.name)
    }

    pub fn is_writable(&self) -> bool {
        register_info(self.id()).is_some_and(|info| info.writable)
    }

    /// `RRG` command for a register id in the table.
    pub fn read_command(id: u8) -> Result<Command, VnError> {
        register_info(id).ok_or(VnError::UnknownRegister(id))?;
        Ok(Command::read_register(id))
    }

    pub fn to_write_command(&self) -> Result<Command, VnError> {
        if !self.is_writable() {
            return Err(VnError::ReadOnlyRegister(self.id()));
        }
        let values = self.values()?;
        Command::write_register(self.id(), &values)
    }

    /// Parses the response body to a register read or write (`"05,115200"`).
    pub fn from_response(id: u8, body: &str) -> Result<Register, VnError> {
        register_info(id).ok_or(VnError::UnknownRegister(id))?;
        let invalid = || VnError::InvalidRegisterValue(id);

        let mut fields = body.split(FIELD_SEPARATOR);
        let echoed: u8 = fields.next().and_then(|f| f.trim().parse().ok()).ok_or_else(invalid)?;
        if echoed != id {
            return Err(invalid());
        }

        let register = match id {
            0 => Register::UserTag(parse_text(&mut fields).ok_or_else(invalid)?),
            1 => Register::Model(parse_text(&mut fields).ok_or_else(invalid)?),
            2 => Register::HardwareVersion(parse_next(&mut fields).ok_or_else(invalid)?),
            3 => Register::SerialNumber(parse_next(&mut fields).ok_or_else(invalid)?),
            4 => Register::FirmwareVersion(parse_text(&mut fields).ok_or_else(invalid)?),
            5 => Register::BaudRate(parse_port_value(&mut fields).ok_or_else(invalid)?),
            6 => Register::AsyncDataOutputType(parse_port_value(&mut fields).ok_or_else(invalid)?),
            7 => Register::AsyncDataOutputFreq(parse_port_value(&mut fields).ok_or_else(invalid)?),
            8 => {
                let yaw = parse_next(&mut fields).ok_or_else(invalid)?;
                let pitch = parse_next(&mut fields).ok_or_else(invalid)?;
                let roll = parse_next(&mut fields).ok_or_else(invalid)?;
                Register::YawPitchRoll(Ypr { yaw, pitch, roll })
            }
            75 => Register::BinaryOutput1(BinaryOutput::parse(id, &mut fields)?),
            76 => Register::BinaryOutput2(BinaryOutput::parse(id, &mut fields)?),
            77 => Register::BinaryOutput3(BinaryOutput::parse(id, &mut fields)?),
            _ => return Err(VnError::UnknownRegister(id)),
        };
        if fields.next().is_some() {
            return Err(invalid());
        }
        Ok(register)
    }

    /// Compares the configuration held by two registers of the same id.
    ///
    /// Registers with different ids are not comparable and yield
    /// [`VnError::RegisterMismatch`].
    pub fn is_config_equal(&self, other: &Register) -> Result<bool, VnError> {
        if self.id() != other.id() {
            return Err(VnError::RegisterMismatch { left: self.id(), right: other.id() });
        }
        Ok(self == other)
    }

    /// Comma separated values as written after the register id.
    pub fn values(&self) -> Result<AsciiMessage, VnError> {
        let mut out = AsciiMessage::new();
        let result = match self {
            Register::UserTag(text) | Register::Model(text) | Register::FirmwareVersion(text) => {
                write!(out, "{}", text)
            }
            Register::HardwareVersion(v) | Register::SerialNumber(v) => write!(out, "{}", v),
            Register::BaudRate(p) | Register::AsyncDataOutputType(p) | Register::AsyncDataOutputFreq(p) => {
                match p.serial_port {
                    Some(port) => write!(out, "{},{}", p.value, port),
                    None => write!(out, "{}", p.value),
                }
            }
            Register::YawPitchRoll(ypr) => {
                write!(out, "{:+08.3},{:+08.3},{:+08.3}", ypr.yaw, ypr.pitch, ypr.roll)
            }
            Register::BinaryOutput1(b) | Register::BinaryOutput2(b) | Register::BinaryOutput3(b) => {
                b.write_values(&mut out)
            }
        };
        result.map_err(|_| VnError::MessageTooLong { max: ASCII_MESSAGE_MAX_LEN })?;
        Ok(out)
    }

    /// The binary output configuration, for registers 75-77.
    pub fn binary_output(&self) -> Option<&BinaryOutput> {
        match self {
            Register::BinaryOutput1(b) | Register::BinaryOutput2(b) | Register::BinaryOutput3(b) => Some(b),
            _ => None,
        }
    }
}

fn parse_next<'a, T: core::str::FromStr>(fields: &mut impl Iterator<Item = &'a str>) -> Option<T> {
    fields.next()?.trim().parse().ok()
}

fn parse_text<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Option<RegisterText> {
    RegisterText::from(fields.next()?.trim()).ok()
}

fn parse_port_value<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Option<PortValue> {
    let value = parse_next(fields)?;
    let serial_port = match fields.next() {
        Some(port) => Some(port.trim().parse().ok()?),
        None => None,
    };
    Some(PortValue { value, serial_port })
}
