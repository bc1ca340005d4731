// src/measurement/ascii.rs

//! Decoding of the ASCII asynchronous measurement outputs.

use core::str::FromStr;

use crate::common::ascii;
use crate::common::error::VnError;

use super::composite::CompositeData;
use super::types::{DeltaTheta, InsStatus, Lla, Quat, Ypr};

/// Headers of the ASCII asynchronous outputs the sensor family can emit.
///
/// Frames carrying one of these are measurements, never command responses.
pub const ASCII_OUTPUT_HEADERS: [&str; 22] = [
    "VNYPR", "VNQTN", "VNQMR", "VNMAG", "VNACC", "VNGYR", "VNMAR", "VNYMR", "VNYBA", "VNYIA",
    "VNIMU", "VNDTV", "VNGPS", "VNGPE", "VNINS", "VNINE", "VNISL", "VNISE", "VNG2S", "VNG2E",
    "VNHVE", "VNRTK",
];

/// Subset of [`ASCII_OUTPUT_HEADERS`] decoded into [`CompositeData`].
pub const ASCII_MEASUREMENT_HEADERS: [&str; 14] = [
    "VNYPR", "VNQTN", "VNQMR", "VNMAG", "VNACC", "VNGYR", "VNMAR", "VNYMR", "VNYBA", "VNYIA",
    "VNIMU", "VNDTV", "VNINS", "VNINE",
];

/// True for any asynchronous output header, decoded or not.
pub fn is_ascii_measurement(header: &str) -> bool {
    ASCII_OUTPUT_HEADERS.contains(&header)
}

/// Decodes an ASCII measurement frame.
///
/// # Arguments
///
/// * `message`: The frame text, with or without `$`, checksum and terminator.
///
/// # Returns
///
/// The decoded record, or `Ok(None)` when the header is not one of
/// [`ASCII_MEASUREMENT_HEADERS`]. A decodable header whose fields do not parse yields
/// [`VnError::InvalidFormat`].
pub fn decode_ascii_measurement(message: &str) -> Result<Option<CompositeData>, VnError> {
    let mut data = CompositeData::default();
    let mut f = Fields(ascii::fields(message));
    match ascii::header(message) {
        "VNYPR" => {
            data.attitude.ypr = Some(f.ypr()?);
        }
        "VNQTN" => {
            data.attitude.quaternion = Some(f.quat()?);
        }
        "VNQMR" => {
            data.attitude.quaternion = Some(f.quat()?);
            data.imu.mag = Some(f.vec3()?);
            data.imu.accel = Some(f.vec3()?);
            data.imu.angular_rate = Some(f.vec3()?);
        }
        "VNMAG" => data.imu.mag = Some(f.vec3()?),
        "VNACC" => data.imu.accel = Some(f.vec3()?),
        "VNGYR" => data.imu.angular_rate = Some(f.vec3()?),
        "VNYMR" => {
            data.attitude.ypr = Some(f.ypr()?);
            data.imu.mag = Some(f.vec3()?);
            data.imu.accel = Some(f.vec3()?);
            data.imu.angular_rate = Some(f.vec3()?);
        }
        "VNMAR" => {
            data.imu.mag = Some(f.vec3()?);
            data.imu.accel = Some(f.vec3()?);
            data.imu.angular_rate = Some(f.vec3()?);
        }
        "VNYBA" => {
            data.attitude.ypr = Some(f.ypr()?);
            data.attitude.lin_body_acc = Some(f.vec3()?);
            data.imu.angular_rate = Some(f.vec3()?);
        }
        "VNYIA" => {
            data.attitude.ypr = Some(f.ypr()?);
            data.attitude.lin_accel_ned = Some(f.vec3()?);
            data.imu.angular_rate = Some(f.vec3()?);
        }
        "VNIMU" => {
            data.imu.uncomp_mag = Some(f.vec3()?);
            data.imu.uncomp_accel = Some(f.vec3()?);
            data.imu.uncomp_gyro = Some(f.vec3()?);
            data.imu.temperature = Some(f.parse()?);
            data.imu.pressure = Some(f.parse()?);
        }
        "VNDTV" => {
            let delta_time = f.parse()?;
            data.imu.delta_theta = Some(DeltaTheta { delta_time, delta_theta: f.vec3()? });
            data.imu.delta_vel = Some(f.vec3()?);
        }
        // tow, week, status, ypr, position, velocity, then attitude/position/velocity uncertainty
        header @ ("VNINS" | "VNINE") => {
            let tow: f64 = f.parse()?;
            data.time.time_gps_tow = Some((tow * 1e9).round() as u64);
            data.time.time_gps_week = Some(f.parse()?);
            data.ins.ins_status = Some(InsStatus(f.hex_u16()?));
            data.attitude.ypr = Some(f.ypr()?);
            if header == "VNINS" {
                let [lat, lon, alt] = f.vec3()?;
                data.ins.pos_lla = Some(Lla { lat, lon, alt });
                data.ins.vel_ned = Some(f.vec3()?);
            } else {
                data.ins.pos_ecef = Some(f.vec3()?);
                data.ins.vel_ecef = Some(f.vec3()?);
            }
            data.attitude.att_u = Some(f.parse()?);
            data.ins.pos_u = Some(f.parse()?);
            data.ins.vel_u = Some(f.parse()?);
        }
        _ => return Ok(None),
    }
    f.finish()?;
    Ok(Some(data))
}

/// Cursor over the comma separated fields after the header token.
struct Fields<I>(I);

impl<'a, I> Fields<I>
where
    I: Iterator<Item = &'a str>,
{
    fn parse<T: FromStr>(&mut self) -> Result<T, VnError> {
        self.0
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or(VnError::InvalidFormat)
    }

    fn hex_u16(&mut self) -> Result<u16, VnError> {
        self.0
            .next()
            .and_then(|f| u16::from_str_radix(f.trim(), 16).ok())
            .ok_or(VnError::InvalidFormat)
    }

    fn vec3<T: FromStr>(&mut self) -> Result<[T; 3], VnError> {
        Ok([self.parse()?, self.parse()?, self.parse()?])
    }

    fn ypr(&mut self) -> Result<Ypr, VnError> {
        let [yaw, pitch, roll] = self.vec3()?;
        Ok(Ypr { yaw, pitch, roll })
    }

    fn quat(&mut self) -> Result<Quat, VnError> {
        let vector = self.vec3()?;
        Ok(Quat { vector, scalar: self.parse()? })
    }

    /// Fails when fields are left over.
    fn finish(mut self) -> Result<(), VnError> {
        match self.0.next() {
            Some(_) => Err(VnError::InvalidFormat),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ypr() {
        let data = decode_ascii_measurement("$VNYPR,+010.071,-000.278,-001.026*65")
            .unwrap()
            .unwrap();
        let ypr = data.attitude.ypr.unwrap();
        assert_eq!(ypr.yaw, 10.071);
        assert_eq!(ypr.pitch, -0.278);
        assert_eq!(ypr.roll, -1.026);
    }

    #[test]
    fn test_decode_ymr() {
        let msg = "$VNYMR,+1.0,+2.0,+3.0,+0.1,+0.2,+0.3,+0.0,+0.0,-9.8,+0.01,+0.02,+0.03*00";
        let data = decode_ascii_measurement(msg).unwrap().unwrap();
        assert_eq!(data.imu.accel, Some([0.0, 0.0, -9.8]));
        assert_eq!(data.imu.angular_rate, Some([0.01, 0.02, 0.03]));
        assert!(data.attitude.ypr.is_some());
    }

    #[test]
    fn test_decode_dtv_and_imu() {
        let data = decode_ascii_measurement("$VNDTV,0.05,1,2,3,4,5,6*00").unwrap().unwrap();
        let dtheta = data.imu.delta_theta.unwrap();
        assert_eq!(dtheta.delta_time, 0.05);
        assert_eq!(data.imu.delta_vel, Some([4.0, 5.0, 6.0]));

        let data = decode_ascii_measurement("$VNIMU,1,2,3,4,5,6,7,8,9,25.5,101.3*00")
            .unwrap()
            .unwrap();
        assert_eq!(data.imu.temperature, Some(25.5));
        assert_eq!(data.imu.pressure, Some(101.3));
    }

    #[test]
    fn test_non_measurement_and_bad_fields() {
        assert_eq!(decode_ascii_measurement("$VNRRG,05,115200*E2D9"), Ok(None));
        assert_eq!(decode_ascii_measurement("$VNYPR,1.0,2.0*00"), Err(VnError::InvalidFormat));
        assert_eq!(decode_ascii_measurement("$VNYPR,1.0,2.0,3.0,4.0*00"), Err(VnError::InvalidFormat));
        assert_eq!(decode_ascii_measurement("$VNYPR,a,b,c*00"), Err(VnError::InvalidFormat));
        assert!(is_ascii_measurement("VNQTN"));
        assert!(!is_ascii_measurement("VNRRG"));
    }

    #[test]
    fn test_decode_ins() {
        let msg = "$VNINS,328571.500000,2043,0206,+010.071,-000.278,-001.026,+37.42000000,-122.08000000,+00045.200,-000.500,+001.250,+000.000,+00.5,+02.1,+0.10*XX";
        let data = decode_ascii_measurement(msg).unwrap().unwrap();
        assert_eq!(data.time.time_gps_tow, Some(328_571_500_000_000));
        assert_eq!(data.time.time_gps_week, Some(2043));
        assert_eq!(data.ins.ins_status.unwrap().raw(), 0x0206);
        assert_eq!(data.attitude.ypr.unwrap().yaw, 10.071);
        let lla = data.ins.pos_lla.unwrap();
        assert_eq!((lla.lat, lla.lon, lla.alt), (37.42, -122.08, 45.2));
        assert_eq!(data.ins.vel_ned, Some([-0.5, 1.25, 0.0]));
        assert_eq!(data.attitude.att_u, Some(0.5));
        assert_eq!(data.ins.vel_u, Some(0.1));
        assert_eq!(data.ins.pos_ecef, None);
    }

    #[test]
    fn test_output_family() {
        let data = decode_ascii_measurement("$VNACC,+00.1,-00.2,-09.8*XX").unwrap().unwrap();
        assert_eq!(data.imu.accel, Some([0.1, -0.2, -9.8]));

        let qmr = "$VNQMR,0,0,0,1,0.1,0.2,0.3,0,0,-9.8,0.01,0.02,0.03*XX";
        let data = decode_ascii_measurement(qmr).unwrap().unwrap();
        assert_eq!(data.attitude.quaternion.unwrap().scalar, 1.0);
        assert_eq!(data.imu.angular_rate, Some([0.01, 0.02, 0.03]));

        // recognized outputs that are not decoded
        assert!(is_ascii_measurement("VNGPS"));
        assert_eq!(decode_ascii_measurement("$VNGPS,1,2,3*XX"), Ok(None));
        for header in ASCII_MEASUREMENT_HEADERS {
            assert!(is_ascii_measurement(header), "{header}");
        }
    }
}
