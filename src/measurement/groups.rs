// src/measurement/groups.rs

//! Static size table and typed records of the binary measurement groups.
//!
//! Each group struct is generated by [`binary_group!`] from a single `bit => field: Type`
//! listing, so the wire width, the decoder and the record layout cannot drift apart.

use super::enabled::BinaryGroup;
use super::header::BinaryHeader;
use super::types::*;

macro_rules! binary_group {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$fmeta:meta])* $bit:literal => $field:ident: $ty:ty,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $($(#[$fmeta])* pub $field: Option<$ty>,)*
        }

        impl $name {
            /// Mask of every field bit with a known wire width.
            pub const KNOWN_FIELDS: u32 = 0 $(| (1 << $bit))*;

            pub fn field_size(field: u8) -> Option<FieldSize> {
                match field {
                    $($bit => Some(<$ty as MeasurementValue>::SIZE),)*
                    _ => None,
                }
            }

            /// Decodes `field` into its slot. Returns `false` for a field the group does not know.
            pub fn decode_field(
                &mut self,
                field: u8,
                reader: &mut ByteReader<'_>,
            ) -> Result<bool, DecodeError> {
                match field {
                    $($bit => {
                        self.$field = Some(<$ty as MeasurementValue>::decode(reader)?);
                        Ok(true)
                    })*
                    _ => Ok(false),
                }
            }

            /// Bitmask of the fields that hold a value.
            pub fn present_fields(&self) -> u32 {
                let mut mask = 0u32;
                $(
                    if self.$field.is_some() {
                        mask |= 1 << $bit;
                    }
                )*
                mask
            }

            pub fn is_empty(&self) -> bool {
                self.present_fields() == 0
            }
        }
    };
}

binary_group! {
    TimeGroup {
        0 => time_startup: u64,
        1 => time_gps: u64,
        2 => time_gps_tow: u64,
        3 => time_gps_week: u16,
        4 => time_sync_in: u64,
        5 => time_gps_pps: u64,
        6 => time_utc: TimeUtc,
        7 => sync_in_cnt: u32,
        8 => sync_out_cnt: u32,
        9 => time_status: TimeStatus,
    }
}

binary_group! {
    ImuGroup {
        0 => imu_status: ImuStatus,
        1 => uncomp_mag: Vec3f,
        2 => uncomp_accel: Vec3f,
        3 => uncomp_gyro: Vec3f,
        4 => temperature: f32,
        5 => pressure: f32,
        6 => delta_theta: DeltaTheta,
        7 => delta_vel: Vec3f,
        8 => mag: Vec3f,
        9 => accel: Vec3f,
        10 => angular_rate: Vec3f,
        11 => sens_sat: SensSat,
    }
}

binary_group! {
    /// Layout shared by all three GNSS receivers.
    GnssGroup {
        0 => time_utc: TimeUtc,
        1 => tow: u64,
        2 => week: u16,
        3 => num_sats: u8,
        4 => fix: u8,
        5 => pos_lla: Lla,
        6 => pos_ecef: Vec3d,
        7 => vel_ned: Vec3f,
        8 => vel_ecef: Vec3f,
        9 => pos_uncertainty: Vec3f,
        10 => vel_uncertainty: f32,
        11 => time_uncertainty: f32,
        12 => time_info: GnssTimeInfo,
        13 => dop: GnssDop,
        14 => sat_info: GnssSatInfo,
        16 => raw_meas: GnssRawMeas,
        17 => status: GnssStatus,
        18 => alt_msl: f64,
    }
}

binary_group! {
    AttitudeGroup {
        0 => ahrs_status: AhrsStatus,
        1 => ypr: Ypr,
        2 => quaternion: Quat,
        3 => dcm: Dcm,
        4 => mag_ned: Vec3f,
        5 => accel_ned: Vec3f,
        6 => lin_body_acc: Vec3f,
        7 => lin_accel_ned: Vec3f,
        8 => ypr_u: Vec3f,
        12 => heave: Vec3f,
        13 => att_u: f32,
    }
}

binary_group! {
    InsGroup {
        0 => ins_status: InsStatus,
        1 => pos_lla: Lla,
        2 => pos_ecef: Vec3d,
        3 => vel_body: Vec3f,
        4 => vel_ned: Vec3f,
        5 => vel_ecef: Vec3f,
        6 => mag_ecef: Vec3f,
        7 => accel_ecef: Vec3f,
        8 => lin_accel_ecef: Vec3f,
        9 => pos_u: f32,
        10 => vel_u: f32,
    }
}

/// Fields of the common group, by common bit, as the (group, field) pairs they stand for.
/// Wire order within a common field follows the listed order.
pub static COMMON_FIELDS: [&[(BinaryGroup, u8)]; 15] = [
    &[(BinaryGroup::Time, 0)],
    &[(BinaryGroup::Time, 1)],
    &[(BinaryGroup::Time, 4)],
    &[(BinaryGroup::Attitude, 1)],
    &[(BinaryGroup::Attitude, 2)],
    &[(BinaryGroup::Imu, 10)],
    &[(BinaryGroup::Ins, 1)],
    &[(BinaryGroup::Ins, 4)],
    &[(BinaryGroup::Imu, 9)],
    &[(BinaryGroup::Imu, 2), (BinaryGroup::Imu, 3)],
    &[(BinaryGroup::Imu, 8), (BinaryGroup::Imu, 4), (BinaryGroup::Imu, 5)],
    &[(BinaryGroup::Imu, 6), (BinaryGroup::Imu, 7)],
    &[(BinaryGroup::Ins, 0)],
    &[(BinaryGroup::Time, 7)],
    &[(BinaryGroup::Time, 5)],
];

/// Wire width of one field of a measurement group.
pub fn field_size(group: BinaryGroup, field: u8) -> Option<FieldSize> {
    match group {
        BinaryGroup::Common => None,
        BinaryGroup::Time => TimeGroup::field_size(field),
        BinaryGroup::Imu => ImuGroup::field_size(field),
        BinaryGroup::Gnss | BinaryGroup::Gnss2 | BinaryGroup::Gnss3 => GnssGroup::field_size(field),
        BinaryGroup::Attitude => AttitudeGroup::field_size(field),
        BinaryGroup::Ins => InsGroup::field_size(field),
    }
}

/// The (group, field) sequence a payload carries, in wire order, with common fields expanded.
pub fn wire_fields(header: &BinaryHeader) -> Result<Vec<(BinaryGroup, u8)>, DecodeError> {
    let mut fields = Vec::new();
    for g in header.groups() {
        for bit in 0..32u8 {
            if g.types & (1 << bit) == 0 {
                continue;
            }
            let unknown = DecodeError::UnknownField { group: g.group.header_bit(), field: bit };
            match g.group {
                BinaryGroup::Common => {
                    let aliases = COMMON_FIELDS.get(usize::from(bit)).ok_or(unknown)?;
                    fields.extend_from_slice(aliases);
                }
                group => {
                    field_size(group, bit).ok_or(unknown)?;
                    fields.push((group, bit));
                }
            }
        }
    }
    Ok(fields)
}
