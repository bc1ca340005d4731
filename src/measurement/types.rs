// src/measurement/types.rs

//! Measurement value types and the little-endian field reader used by the binary decoder.

/// Most satellites or raw measurements a single GNSS record can carry.
pub const SATELLITE_MAX_COUNT: usize = 50;

/// Error raised while decoding a binary payload.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DecodeError {
    /// Payload ended before the field was complete.
    UnexpectedEnd,
    /// The header enables a field the size table does not know.
    UnknownField { group: u8, field: u8 },
    /// A counted field declares more elements than allowed.
    CountTooLarge { count: usize },
    /// Bytes were left over after every enabled field was decoded.
    TrailingBytes { remaining: usize },
}

/// Cursor over a little-endian payload.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or(DecodeError::UnexpectedEnd)?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

/// Width in bytes of one binary field.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FieldSize {
    Fixed(usize),
    /// `prefix` bytes of fixed data, one of which (at `count_offset`) holds the number of
    /// `element`-sized records that follow.
    Counted { prefix: usize, count_offset: usize, element: usize },
}

impl FieldSize {
    /// Resolves the width of a field starting at `data[0]`.
    ///
    /// Returns `Ok(None)` when more bytes are needed to know the width.
    pub fn resolve(self, data: &[u8]) -> Result<Option<usize>, DecodeError> {
        match self {
            FieldSize::Fixed(n) => Ok(Some(n)),
            FieldSize::Counted { prefix, count_offset, element } => {
                let Some(count) = data.get(count_offset) else {
                    return Ok(None);
                };
                let count = usize::from(*count);
                if count > SATELLITE_MAX_COUNT {
                    return Err(DecodeError::CountTooLarge { count });
                }
                Ok(Some(prefix + count * element))
            }
        }
    }
}

/// A value that can be read from a binary payload.
pub trait MeasurementValue: Sized {
    const SIZE: FieldSize;

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError>;
}

/// Fixed-width little-endian scalars.
pub trait Primitive: MeasurementValue + Copy + Default {
    const WIDTH: usize;
}

macro_rules! primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl MeasurementValue for $ty {
                const SIZE: FieldSize = FieldSize::Fixed(core::mem::size_of::<$ty>());

                fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
                    Ok(<$ty>::from_le_bytes(reader.take()?))
                }
            }

            impl Primitive for $ty {
                const WIDTH: usize = core::mem::size_of::<$ty>();
            }
        )*
    };
}

primitive!(u8, i8, u16, i16, u32, u64, f32, f64);

impl<T: Primitive, const N: usize> MeasurementValue for [T; N] {
    const SIZE: FieldSize = FieldSize::Fixed(T::WIDTH * N);

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let mut out = [T::default(); N];
        for slot in out.iter_mut() {
            *slot = T::decode(reader)?;
        }
        Ok(out)
    }
}

pub type Vec3f = [f32; 3];
pub type Vec3d = [f64; 3];

/// Direction cosine matrix, row major.
pub type Dcm = [f32; 9];

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Ypr {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl MeasurementValue for Ypr {
    const SIZE: FieldSize = FieldSize::Fixed(12);

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let [yaw, pitch, roll] = <[f32; 3]>::decode(reader)?;
        Ok(Ypr { yaw, pitch, roll })
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quat {
    pub vector: Vec3f,
    pub scalar: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Quat { vector: [0.0; 3], scalar: 1.0 }
    }
}

impl MeasurementValue for Quat {
    const SIZE: FieldSize = FieldSize::Fixed(16);

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let vector = <[f32; 3]>::decode(reader)?;
        let scalar = f32::decode(reader)?;
        Ok(Quat { vector, scalar })
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Lla {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl MeasurementValue for Lla {
    const SIZE: FieldSize = FieldSize::Fixed(24);

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let [lat, lon, alt] = <[f64; 3]>::decode(reader)?;
        Ok(Lla { lat, lon, alt })
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DeltaTheta {
    pub delta_time: f32,
    pub delta_theta: Vec3f,
}

impl MeasurementValue for DeltaTheta {
    const SIZE: FieldSize = FieldSize::Fixed(16);

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let delta_time = f32::decode(reader)?;
        let delta_theta = <[f32; 3]>::decode(reader)?;
        Ok(DeltaTheta { delta_time, delta_theta })
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TimeUtc {
    /// Years since 2000.
    pub year: i8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub frac_sec: u16,
}

impl MeasurementValue for TimeUtc {
    const SIZE: FieldSize = FieldSize::Fixed(8);

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(TimeUtc {
            year: i8::decode(reader)?,
            month: u8::decode(reader)?,
            day: u8::decode(reader)?,
            hour: u8::decode(reader)?,
            minute: u8::decode(reader)?,
            second: u8::decode(reader)?,
            frac_sec: u16::decode(reader)?,
        })
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct GnssTimeInfo {
    pub gnss_time_status: u8,
    pub leap_seconds: i8,
}

impl MeasurementValue for GnssTimeInfo {
    const SIZE: FieldSize = FieldSize::Fixed(2);

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(GnssTimeInfo { gnss_time_status: u8::decode(reader)?, leap_seconds: i8::decode(reader)? })
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct GnssDop {
    pub g_dop: f32,
    pub p_dop: f32,
    pub t_dop: f32,
    pub v_dop: f32,
    pub h_dop: f32,
    pub n_dop: f32,
    pub e_dop: f32,
}

impl MeasurementValue for GnssDop {
    const SIZE: FieldSize = FieldSize::Fixed(28);

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let [g_dop, p_dop, t_dop, v_dop, h_dop, n_dop, e_dop] = <[f32; 7]>::decode(reader)?;
        Ok(GnssDop { g_dop, p_dop, t_dop, v_dop, h_dop, n_dop, e_dop })
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SatInfoEntry {
    pub sys: u8,
    pub sv_id: u8,
    pub flags: u8,
    pub cno: u8,
    pub qi: u8,
    pub el: i8,
    pub az: i16,
}

/// Per-satellite tracking summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GnssSatInfo {
    pub num_sats: u8,
    pub resv: u8,
    pub sats: Vec<SatInfoEntry>,
}

impl MeasurementValue for GnssSatInfo {
    const SIZE: FieldSize = FieldSize::Counted { prefix: 2, count_offset: 0, element: 8 };

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let num_sats = u8::decode(reader)?;
        let resv = u8::decode(reader)?;
        if usize::from(num_sats) > SATELLITE_MAX_COUNT {
            return Err(DecodeError::CountTooLarge { count: usize::from(num_sats) });
        }
        let mut sats = Vec::with_capacity(usize::from(num_sats));
        for _ in 0..num_sats {
            sats.push(SatInfoEntry {
                sys: u8::decode(reader)?,
                sv_id: u8::decode(reader)?,
                flags: u8::decode(reader)?,
                cno: u8::decode(reader)?,
                qi: u8::decode(reader)?,
                el: i8::decode(reader)?,
                az: i16::decode(reader)?,
            });
        }
        Ok(GnssSatInfo { num_sats, resv, sats })
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct RawMeasEntry {
    pub sys: u8,
    pub sv_id: u8,
    pub band: u8,
    pub chan: u8,
    pub freq_num: i8,
    pub cno: u8,
    pub flags: u16,
    pub pr: f64,
    pub cp: f64,
    pub dp: f32,
}

/// Raw pseudorange/carrier-phase measurements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GnssRawMeas {
    pub tow: f64,
    pub week: u16,
    pub num_meas: u8,
    pub resv: u8,
    pub meas: Vec<RawMeasEntry>,
}

impl MeasurementValue for GnssRawMeas {
    const SIZE: FieldSize = FieldSize::Counted { prefix: 12, count_offset: 10, element: 28 };

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let tow = f64::decode(reader)?;
        let week = u16::decode(reader)?;
        let num_meas = u8::decode(reader)?;
        let resv = u8::decode(reader)?;
        if usize::from(num_meas) > SATELLITE_MAX_COUNT {
            return Err(DecodeError::CountTooLarge { count: usize::from(num_meas) });
        }
        let mut meas = Vec::with_capacity(usize::from(num_meas));
        for _ in 0..num_meas {
            meas.push(RawMeasEntry {
                sys: u8::decode(reader)?,
                sv_id: u8::decode(reader)?,
                band: u8::decode(reader)?,
                chan: u8::decode(reader)?,
                freq_num: i8::decode(reader)?,
                cno: u8::decode(reader)?,
                flags: u16::decode(reader)?,
                pr: f64::decode(reader)?,
                cp: f64::decode(reader)?,
                dp: f32::decode(reader)?,
            });
        }
        Ok(GnssRawMeas { tow, week, num_meas, resv, meas })
    }
}

// --- Status words ---
//
// Bit layouts are fixed by the sensor; each accessor masks and shifts the raw word.

macro_rules! status_word {
    (
        $(#[$meta:meta])*
        $name:ident($raw:ty) {
            $($(#[$fmeta:meta])* $field:ident: $shift:literal, $width:literal;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
        pub struct $name(pub $raw);

        impl $name {
            pub const fn raw(&self) -> $raw {
                self.0
            }

            $(
                $(#[$fmeta])*
                pub const fn $field(&self) -> $raw {
                    (self.0 >> $shift) & ((1 << $width) - 1)
                }
            )*
        }

        impl From<$raw> for $name {
            fn from(value: $raw) -> Self {
                $name(value)
            }
        }

        impl From<$name> for $raw {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl MeasurementValue for $name {
            const SIZE: FieldSize = FieldSize::Fixed(core::mem::size_of::<$raw>());

            fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
                Ok($name(<$raw>::decode(reader)?))
            }
        }
    };
}

status_word! {
    TimeStatus(u8) {
        tow_valid: 0, 1;
        date_valid: 1, 1;
        utc_valid: 2, 1;
    }
}

status_word! {
    ImuStatus(u16) {
        gyro_status: 0, 2;
        accel_status: 2, 2;
        mag_status: 4, 2;
        pres_temp_status: 6, 2;
    }
}

status_word! {
    AhrsStatus(u16) {
        attitude_quality: 0, 2;
        gyro_saturation: 2, 1;
        gyro_saturation_recovery: 3, 1;
        mag_disturbance: 4, 2;
        mag_saturation: 6, 1;
        acc_disturbance: 7, 2;
        acc_saturation: 9, 1;
        known_mag_disturbance: 11, 1;
        known_acc_disturbance: 12, 1;
    }
}

status_word! {
    InsStatus(u16) {
        /// 0 not tracking, 1 aligning, 2 tracking, 3 GNSS loss.
        mode: 0, 2;
        gnss_fix: 2, 1;
        imu_err: 4, 1;
        mag_pres_err: 5, 1;
        gnss_err: 6, 1;
        gnss_compass_fix: 8, 2;
    }
}

status_word! {
    GnssStatus(u16) {
        enabled: 0, 1;
        operational: 1, 1;
        fix: 2, 1;
        antenna_signal_error: 3, 1;
        used_for_nav: 4, 1;
        data_source: 8, 3;
        used_for_nav_curr: 11, 1;
        pps_used_for_time: 12, 1;
    }
}

status_word! {
    /// Saturation flags per sensor axis.
    SensSat(u16) {
        mag_x: 0, 1;
        mag_y: 1, 1;
        mag_z: 2, 1;
        acc_x: 3, 1;
        acc_y: 4, 1;
        acc_z: 5, 1;
        gyro_x: 6, 1;
        gyro_y: 7, 1;
        gyro_z: 8, 1;
        pres: 9, 1;
    }
}
