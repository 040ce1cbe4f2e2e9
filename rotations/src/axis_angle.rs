use crate::{RotationTrait, prelude::UnitQuaternion};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Copy, Clone)]
pub enum AxisAngleErrors {
    #[error("axis must be finite and have a non-zero magnitude")]
    InvalidAxis,
}

/// Rotation of `angle` radians about a unit `axis`, right-handed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisAngle {
    pub angle: f64,
    pub axis: Vector3<f64>,
}

impl AxisAngle {
    pub fn new(angle: f64, axis: Vector3<f64>) -> Result<Self, AxisAngleErrors> {
        let norm = axis.norm();
        if !norm.is_finite() || norm < 1e-12 {
            return Err(AxisAngleErrors::InvalidAxis);
        }
        Ok(Self {
            angle,
            axis: axis / norm,
        })
    }

    /// Splits a rotation vector (angular rate times a timestep) into angle and
    /// axis. `None` when the vector is too short to carry a direction.
    pub fn from_rotation_vector(v: &Vector3<f64>) -> Option<Self> {
        Self::new(v.norm(), *v).ok()
    }

    /// The inverse of [`AxisAngle::from_rotation_vector`].
    pub fn rotation_vector(&self) -> Vector3<f64> {
        self.axis * self.angle
    }
}

impl RotationTrait for AxisAngle {
    fn rotate(&self, v: &Vector3<f64>) -> Vector3<f64> {
        UnitQuaternion::from(self).rotate(v)
    }

    fn transform(&self, v: &Vector3<f64>) -> Vector3<f64> {
        UnitQuaternion::from(self).transform(v)
    }

    fn inv(&self) -> Self {
        Self {
            angle: -self.angle,
            axis: self.axis,
        }
    }

    fn identity() -> Self {
        Self {
            angle: 0.0,
            axis: Vector3::x(),
        }
    }
}
