use crate::{CenterOfMass, Inertia, MassProperties, MassPropertiesErrors};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Solid box. `width` runs along body x, `height` along y, `depth` along z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    pub mass: f64,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub center: Vector3<f64>,
}

impl Cuboid {
    pub fn new(mass: f64, width: f64, height: f64, depth: f64) -> Self {
        Self {
            mass,
            width,
            height,
            depth,
            center: Vector3::zeros(),
        }
    }

    pub fn with_center(mut self, center: Vector3<f64>) -> Self {
        self.center = center;
        self
    }
}

/// Solid cylinder with its axis along body z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    pub mass: f64,
    pub radius: f64,
    pub length: f64,
    pub center: Vector3<f64>,
}

impl Cylinder {
    pub fn new(mass: f64, radius: f64, length: f64) -> Self {
        Self {
            mass,
            radius,
            length,
            center: Vector3::zeros(),
        }
    }

    pub fn with_center(mut self, center: Vector3<f64>) -> Self {
        self.center = center;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Cuboid(Cuboid),
    Cylinder(Cylinder),
}

impl Shape {
    fn mass(&self) -> f64 {
        match self {
            Shape::Cuboid(c) => c.mass,
            Shape::Cylinder(c) => c.mass,
        }
    }

    fn center(&self) -> Vector3<f64> {
        match self {
            Shape::Cuboid(c) => c.center,
            Shape::Cylinder(c) => c.center,
        }
    }

    fn validate(&self) -> Result<(), MassPropertiesErrors> {
        if !self.mass().is_finite() || !self.center().iter().all(|v| v.is_finite()) {
            return Err(MassPropertiesErrors::NonFinite);
        }
        if self.mass() <= 0.0 {
            return Err(MassPropertiesErrors::MassLessThanOrEqualToZero);
        }
        let dims: Vec<(&'static str, f64)> = match self {
            Shape::Cuboid(c) => vec![("width", c.width), ("height", c.height), ("depth", c.depth)],
            Shape::Cylinder(c) => vec![("radius", c.radius), ("length", c.length)],
        };
        for (name, value) in dims {
            if !value.is_finite() {
                return Err(MassPropertiesErrors::NonFinite);
            }
            if value <= 0.0 {
                return Err(MassPropertiesErrors::NonPositiveDimension(name));
            }
        }
        Ok(())
    }

    /// Inertia about the shape's own centroid.
    fn centroidal_inertia(&self) -> Matrix3<f64> {
        match self {
            Shape::Cuboid(c) => {
                let (w2, h2, d2) = (c.width.powi(2), c.height.powi(2), c.depth.powi(2));
                let k = c.mass / 12.0;
                Matrix3::from_diagonal(&Vector3::new(k * (h2 + d2), k * (w2 + d2), k * (w2 + h2)))
            }
            Shape::Cylinder(c) => {
                let r2 = c.radius.powi(2);
                let transverse = c.mass * (3.0 * r2 + c.length.powi(2)) / 12.0;
                Matrix3::from_diagonal(&Vector3::new(transverse, transverse, c.mass * r2 / 2.0))
            }
        }
    }
}

impl From<Cuboid> for Shape {
    fn from(c: Cuboid) -> Shape {
        Shape::Cuboid(c)
    }
}

impl From<Cylinder> for Shape {
    fn from(c: Cylinder) -> Shape {
        Shape::Cylinder(c)
    }
}

/// Composes the mass properties of a vehicle out of simple solids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InertiaBuilder {
    pub shapes: Vec<Shape>,
}

impl InertiaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(mut self, shape: impl Into<Shape>) -> Self {
        self.shapes.push(shape.into());
        self
    }

    /// Combined mass, center of mass and inertia about that center.
    /// Each shape's centroidal inertia is shifted with the parallel axis
    /// theorem, `I_c + m (|r|^2 E - r r^T)`.
    pub fn build(&self) -> Result<MassProperties, MassPropertiesErrors> {
        if self.shapes.is_empty() {
            return Err(MassPropertiesErrors::NoShapes);
        }
        for shape in &self.shapes {
            shape.validate()?;
        }

        let mass: f64 = self.shapes.iter().map(|s| s.mass()).sum();
        let com = self
            .shapes
            .iter()
            .fold(Vector3::zeros(), |acc, s| acc + s.mass() * s.center())
            / mass;

        let mut inertia = Matrix3::zeros();
        for shape in &self.shapes {
            let r = shape.center() - com;
            inertia += shape.centroidal_inertia()
                + shape.mass() * (r.norm_squared() * Matrix3::identity() - r * r.transpose());
        }

        MassProperties::new(mass, CenterOfMass::from(com), Inertia::try_from(inertia)?)
    }

    /// Inertia tensor about the combined center of mass.
    pub fn moment_of_inertia(&self) -> Result<Inertia, MassPropertiesErrors> {
        Ok(self.build()?.inertia)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_cuboid_inertia() {
        let inertia = InertiaBuilder::new()
            .with_shape(Cuboid::new(1.0, 1.0, 1.0, 0.1))
            .moment_of_inertia()
            .unwrap();
        assert_abs_diff_eq!(inertia.ixx, 1.01 / 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(inertia.iyy, 1.01 / 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(inertia.izz, 2.0 / 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(inertia.ixy, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_axis_composition() {
        // two identical cylinders at +-1 along x
        let cyl = Cylinder::new(2.0, 0.5, 1.0);
        let props = InertiaBuilder::new()
            .with_shape(cyl.with_center(Vector3::new(1.0, 0.0, 0.0)))
            .with_shape(cyl.with_center(Vector3::new(-1.0, 0.0, 0.0)))
            .build()
            .unwrap();

        let transverse = 2.0 * (3.0 * 0.25 + 1.0) / 12.0;
        let axial = 2.0 * 0.25 / 2.0;
        assert_abs_diff_eq!(props.mass, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(props.center_of_mass.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(props.inertia.ixx, 2.0 * transverse, epsilon = 1e-12);
        assert_abs_diff_eq!(props.inertia.iyy, 2.0 * (transverse + 2.0), epsilon = 1e-12);
        assert_abs_diff_eq!(props.inertia.izz, 2.0 * (axial + 2.0), epsilon = 1e-12);
    }

    #[test]
    fn test_offset_center_of_mass() {
        let props = InertiaBuilder::new()
            .with_shape(Cuboid::new(1.0, 1.0, 1.0, 1.0))
            .with_shape(Cuboid::new(3.0, 1.0, 1.0, 1.0).with_center(Vector3::new(0.0, 0.0, 1.0)))
            .build()
            .unwrap();
        assert_abs_diff_eq!(props.center_of_mass.z, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_builder_rejects_bad_shapes() {
        assert_eq!(InertiaBuilder::new().build(), Err(MassPropertiesErrors::NoShapes));
        assert_eq!(
            InertiaBuilder::new()
                .with_shape(Cuboid::new(1.0, 0.0, 1.0, 1.0))
                .build(),
            Err(MassPropertiesErrors::NonPositiveDimension("width"))
        );
        assert_eq!(
            InertiaBuilder::new()
                .with_shape(Cylinder::new(-1.0, 1.0, 1.0))
                .build(),
            Err(MassPropertiesErrors::MassLessThanOrEqualToZero)
        );
    }
}
