use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod shapes;

pub use shapes::{Cuboid, Cylinder, InertiaBuilder, Shape};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MassPropertiesErrors {
    #[error("Ixx cant be less than or equal to  zero")]
    IxxLessThanOrEqualToZero,
    #[error("Iyy cant be less than or equal to zero")]
    IyyLessThanOrEqualToZero,
    #[error("Izz cant be less than or equal to zero")]
    IzzLessThanOrEqualToZero,
    #[error("inertia tensor is not symmetric")]
    InertiaNotSymmetric,
    #[error("inertia tensor is not positive definite (singular or non-physical)")]
    InertiaNotPositiveDefinite,
    #[error("mass cannot be less than or equal to zero")]
    MassLessThanOrEqualToZero,
    #[error("mass properties must be finite")]
    NonFinite,
    #[error("shape dimension '{0}' must be greater than zero")]
    NonPositiveDimension(&'static str),
    #[error("inertia builder needs at least one shape")]
    NoShapes,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CenterOfMass {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CenterOfMass {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl From<Vector3<f64>> for CenterOfMass {
    fn from(v: Vector3<f64>) -> CenterOfMass {
        CenterOfMass::new(v[0], v[1], v[2])
    }
}

/// Inertia tensor about the center of mass, body frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inertia {
    pub ixx: f64,
    pub iyy: f64,
    pub izz: f64,
    pub ixy: f64,
    pub ixz: f64,
    pub iyz: f64,
}

impl Inertia {
    pub fn new(
        ixx: f64,
        iyy: f64,
        izz: f64,
        ixy: f64,
        ixz: f64,
        iyz: f64,
    ) -> Result<Self, MassPropertiesErrors> {
        if ![ixx, iyy, izz, ixy, ixz, iyz].iter().all(|v| v.is_finite()) {
            return Err(MassPropertiesErrors::NonFinite);
        }
        if ixx <= f64::EPSILON {
            return Err(MassPropertiesErrors::IxxLessThanOrEqualToZero);
        }
        if iyy <= f64::EPSILON {
            return Err(MassPropertiesErrors::IyyLessThanOrEqualToZero);
        }
        if izz <= f64::EPSILON {
            return Err(MassPropertiesErrors::IzzLessThanOrEqualToZero);
        }
        let inertia = Self { ixx, iyy, izz, ixy, ixz, iyz };
        // diagonal checks alone accept tensors with large products of inertia
        if inertia.matrix().cholesky().is_none() {
            return Err(MassPropertiesErrors::InertiaNotPositiveDefinite);
        }
        Ok(inertia)
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.ixx, self.ixy, self.ixz, self.ixy, self.iyy, self.iyz, self.ixz, self.iyz,
            self.izz,
        )
    }

    /// Inverse of the tensor. Construction guarantees it exists, the `Option`
    /// only covers tensors built by hand through the public fields.
    pub fn inverse(&self) -> Option<Matrix3<f64>> {
        self.matrix().try_inverse()
    }
}

impl TryFrom<Matrix3<f64>> for Inertia {
    type Error = MassPropertiesErrors;

    fn try_from(m: Matrix3<f64>) -> Result<Inertia, MassPropertiesErrors> {
        let tol = 1e-9 * m.abs().max().max(1.0);
        if (m[(0, 1)] - m[(1, 0)]).abs() > tol
            || (m[(0, 2)] - m[(2, 0)]).abs() > tol
            || (m[(1, 2)] - m[(2, 1)]).abs() > tol
        {
            return Err(MassPropertiesErrors::InertiaNotSymmetric);
        }
        Inertia::new(
            m[(0, 0)],
            m[(1, 1)],
            m[(2, 2)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 2)],
        )
    }
}

/// Represents the mass properties of an object
/// Mass, Center of Mass, Inertia
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub center_of_mass: CenterOfMass,
    pub mass: f64,
    pub inertia: Inertia,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            center_of_mass: CenterOfMass::default(),
            mass: 1.0,
            inertia: Inertia {
                ixx: 1.0,
                iyy: 1.0,
                izz: 1.0,
                ixy: 0.0,
                ixz: 0.0,
                iyz: 0.0,
            },
        }
    }
}

impl MassProperties {
    pub fn new(
        mass: f64,
        center_of_mass: CenterOfMass,
        inertia: Inertia,
    ) -> Result<Self, MassPropertiesErrors> {
        if !mass.is_finite() || !center_of_mass.vector().iter().all(|v| v.is_finite()) {
            return Err(MassPropertiesErrors::NonFinite);
        }
        if mass <= f64::EPSILON {
            return Err(MassPropertiesErrors::MassLessThanOrEqualToZero);
        }
        Ok(MassProperties {
            mass,
            center_of_mass,
            inertia,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inertia_rejects_non_positive_diagonal() {
        assert_eq!(
            Inertia::new(0.0, 1.0, 1.0, 0.0, 0.0, 0.0),
            Err(MassPropertiesErrors::IxxLessThanOrEqualToZero)
        );
        assert_eq!(
            Inertia::new(1.0, -1.0, 1.0, 0.0, 0.0, 0.0),
            Err(MassPropertiesErrors::IyyLessThanOrEqualToZero)
        );
    }

    #[test]
    fn test_inertia_rejects_singular_tensor() {
        // rank 2: every row is a combination of [1,1,0] and [0,0,1]
        assert_eq!(
            Inertia::new(1.0, 1.0, 1.0, 1.0, 0.0, 0.0),
            Err(MassPropertiesErrors::InertiaNotPositiveDefinite)
        );
    }

    #[test]
    fn test_inertia_from_asymmetric_matrix() {
        let m = Matrix3::new(1.0, 0.2, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert_eq!(
            Inertia::try_from(m),
            Err(MassPropertiesErrors::InertiaNotSymmetric)
        );
    }

    #[test]
    fn test_mass_must_be_positive() {
        let inertia = Inertia::new(1.0, 1.0, 1.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(
            MassProperties::new(0.0, CenterOfMass::default(), inertia),
            Err(MassPropertiesErrors::MassLessThanOrEqualToZero)
        );
    }
}
