use crate::axis_angle::AxisAngle;

use super::*;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Mul, Neg};
use thiserror::Error;

/// A struct representing a quaternion for 3D rotations.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Errors that can occur when creating a `Quaternion`.
#[derive(Debug, Clone, Error, Copy)]
pub enum QuaternionErrors {
    #[error("got non-finite quaternion component")]
    NonFinite,
    #[error("got zero magnitude quaternion")]
    ZeroMagnitude,
}

impl Quaternion {
    /// Creates an identity quaternion.
    ///
    /// # Returns
    ///
    /// A `Quaternion` representing no rotation.
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Creates a new `Quaternion`. No normalization is performed,
    /// use `UnitQuaternion` for rotations.
    ///
    /// # Arguments
    ///
    /// * `x` - The x component of the quaternion.
    /// * `y` - The y component of the quaternion.
    /// * `z` - The z component of the quaternion.
    /// * `w` - The scalar component of the quaternion.
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    // Dot product of two quaternions
    pub fn dot(&self, other: &Quaternion) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    pub fn conjugate(&self) -> Quaternion {
        Quaternion::new(-self.x, -self.y, -self.z, self.w)
    }

    pub fn mag(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn normalize(&self) -> Result<Self, QuaternionErrors> {
        if !(self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite())
        {
            return Err(QuaternionErrors::NonFinite);
        }
        let mag = self.mag();
        if mag < f64::EPSILON {
            return Err(QuaternionErrors::ZeroMagnitude);
        }
        Ok(Quaternion::new(
            self.x / mag,
            self.y / mag,
            self.z / mag,
            self.w / mag,
        ))
    }
}

impl Default for Quaternion {
    /// Provides the default value for a quaternion.
    ///
    /// # Returns
    ///
    /// The identity quaternion.
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Quaternion> for Quaternion {
    type Output = Self;

    /// Hamilton product of two quaternions.
    /// Successive products compose active rotations right to left, so that
    /// `(a * b).rotate(v) == a.rotate(b.rotate(v))`.
    ///
    /// # Arguments
    ///
    /// * `rhs` - The right-hand side quaternion.
    ///
    /// # Returns
    ///
    /// The product of the two quaternions.
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

impl Neg for Quaternion {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}

impl fmt::Debug for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Quaternion ")?;
        writeln!(f, "   x: {: >10.6}", self.x)?;
        writeln!(f, "   y: {: >10.6}", self.y)?;
        writeln!(f, "   z: {: >10.6}", self.z)?;
        writeln!(f, "   w: {: >10.6}", self.w)
    }
}

/// A quaternion that is guaranteed to have unit magnitude.
/// Vehicle attitudes are stored as the rotation taking body-frame vectors
/// into the world frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct UnitQuaternion(pub Quaternion);

impl UnitQuaternion {
    pub const IDENTITY: Self = Self(Quaternion::IDENTITY);

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Result<Self, QuaternionErrors> {
        Ok(Self(Quaternion::new(x, y, z, w).normalize()?))
    }

    /// Creates the rotation about +Z by `yaw` radians.
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Self(Quaternion::new(0.0, 0.0, half.sin(), half.cos()))
    }

    /// Exponential map of a rotation vector (axis scaled by angle in radians).
    /// Small vectors fall back to the first order expansion so the map stays
    /// well defined at zero.
    ///
    /// # Arguments
    ///
    /// * `v` - The rotation vector.
    ///
    /// # Returns
    ///
    /// The rotation of `|v|` radians about `v / |v|`.
    pub fn from_rotation_vector(v: &Vector3<f64>) -> Result<Self, QuaternionErrors> {
        let angle = v.norm();
        if !angle.is_finite() {
            return Err(QuaternionErrors::NonFinite);
        }
        match AxisAngle::from_rotation_vector(v) {
            Some(axis_angle) => Ok(Self::from(&axis_angle)),
            None => {
                let q = Quaternion::new(v[0] / 2.0, v[1] / 2.0, v[2] / 2.0, 1.0);
                Ok(Self(q.normalize()?))
            }
        }
    }

    /// Removes the magnitude drift accumulated by repeated composition.
    pub fn renormalize(&self) -> Result<Self, QuaternionErrors> {
        Ok(Self(self.0.normalize()?))
    }

    /// Heading of the body x axis about world +Z (ZYX yaw), in radians.
    pub fn yaw(&self) -> f64 {
        let Quaternion { x, y, z, w } = self.0;
        (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z))
    }

    /// The yaw-only part of this attitude, discarding roll and pitch.
    pub fn yaw_only(&self) -> Self {
        Self::from_yaw(self.yaw())
    }

    /// Active rotation matrix, `matrix() * v == rotate(v)`.
    pub fn matrix(&self) -> Matrix3<f64> {
        let Quaternion { x, y, z, w } = self.0;
        Matrix3::new(
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - z * w),
            2.0 * (x * z + y * w),
            2.0 * (x * y + z * w),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - x * w),
            2.0 * (x * z - y * w),
            2.0 * (y * z + x * w),
            1.0 - 2.0 * (x * x + y * y),
        )
    }

    /// Smallest angle between two attitudes, in radians.
    pub fn angle_to(&self, other: &UnitQuaternion) -> f64 {
        let d = self.0.dot(&other.0).abs().min(1.0);
        2.0 * d.acos()
    }
}

impl TryFrom<&Quaternion> for UnitQuaternion {
    type Error = QuaternionErrors;
    fn try_from(value: &Quaternion) -> Result<Self, QuaternionErrors> {
        Ok(Self(value.normalize()?))
    }
}

impl From<&UnitQuaternion> for Quaternion {
    fn from(value: &UnitQuaternion) -> Self {
        value.0
    }
}

impl RotationTrait for UnitQuaternion {
    /// Rotates a vector by the quaternion, `q v q*`.
    ///
    /// # Arguments
    ///
    /// * `v` - The vector to be rotated.
    ///
    /// # Returns
    ///
    /// The rotated vector.
    fn rotate(&self, v: &Vector3<f64>) -> Vector3<f64> {
        let u = self.0.vector();
        let s = self.0.w;
        let t = 2.0 * u.cross(v);
        v + s * t + u.cross(&t)
    }

    /// Transforms a vector by the quaternion, `q* v q`.
    ///
    /// # Arguments
    ///
    /// * `v` - The vector to be transformed.
    ///
    /// # Returns
    ///
    /// The transformed vector.
    fn transform(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.inv().rotate(v)
    }

    fn identity() -> Self {
        Self::IDENTITY
    }

    fn inv(&self) -> Self {
        // no need to renormalize since the conjugate of a unit quaternion is unit
        UnitQuaternion(self.0.conjugate())
    }
}

impl Mul<UnitQuaternion> for UnitQuaternion {
    type Output = Self;
    fn mul(self, rhs: UnitQuaternion) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl From<&AxisAngle> for UnitQuaternion {
    fn from(axis_angle: &AxisAngle) -> Self {
        let half_angle = axis_angle.angle / 2.0;
        let s = half_angle.sin();
        let c = half_angle.cos();
        // axis is already unit, so the result is unit up to rounding
        UnitQuaternion(Quaternion::new(
            s * axis_angle.axis[0],
            s * axis_angle.axis[1],
            s * axis_angle.axis[2],
            c,
        ))
    }
}
