use super::quaternion::{Quaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Roll, pitch and yaw of a ZYX (yaw, then pitch, then roll) sequence, in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }
}

impl From<&UnitQuaternion> for EulerAngles {
    fn from(q: &UnitQuaternion) -> Self {
        let Quaternion { x, y, z, w } = q.0;
        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
        // clamp keeps asin defined when rounding pushes past +-1 at gimbal lock
        let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin();
        Self { roll, pitch, yaw: q.yaw() }
    }
}

impl From<&EulerAngles> for UnitQuaternion {
    fn from(euler: &EulerAngles) -> Self {
        let (sr, cr) = (euler.roll / 2.0).sin_cos();
        let (sp, cp) = (euler.pitch / 2.0).sin_cos();
        let (sy, cy) = (euler.yaw / 2.0).sin_cos();
        UnitQuaternion(Quaternion::new(
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
            cr * cp * cy + sr * sp * sy,
        ))
    }
}
