// src/measurement/mod.rs

pub mod ascii;
pub mod composite;
pub mod enabled;
pub mod groups;
pub mod header;
pub mod types;

pub use ascii::{decode_ascii_measurement, is_ascii_measurement};
pub use composite::{payload_length, CompositeData, MeasurementSource};
pub use enabled::{BinaryGroup, EnabledMeasurements};
pub use groups::{AttitudeGroup, GnssGroup, ImuGroup, InsGroup, TimeGroup};
pub use header::{BinaryHeader, GroupTypes, HeaderError};
pub use types::{DecodeError, Dcm, Lla, Quat, Vec3d, Vec3f, Ypr};
