// src/lib.rs

//! Host-side protocol stack for VectorNav-class inertial and GNSS sensors.
//!
//! Bytes read from a [`Transport`] land in a [`packet::ByteBuffer`]; the
//! [`packet::PacketSynchronizer`] frames ASCII, `0xFA` and `0xFB` packets out of the stream and
//! hands each to its dispatcher. Measurements are decoded into [`CompositeData`], command
//! responses are matched to outstanding [`Command`]s, and anything unsolicited becomes an
//! [`AsyncError`]. [`Sensor`] ties it together behind a blocking command API.

pub mod command;
pub mod common;
pub mod measurement;
pub mod packet;
pub mod register;
pub mod sensor;

// Re-export key types for convenience
pub use command::{AsyncError, Command, CommandProcessor, CommandState};
pub use common::{Clock, SensorConfig, SensorError, SessionError, StdClock, Transport, VnError};
pub use measurement::{CompositeData, EnabledMeasurements};
pub use register::Register;
pub use sensor::{SendCommandBlockMode, Sensor};
