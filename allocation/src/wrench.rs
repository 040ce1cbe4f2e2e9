use nalgebra::{Vector3, Vector6};
use serde::{Deserialize, Serialize};

/// Frame a demand is expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frame {
    /// Fixed to the vehicle, x forward.
    #[default]
    Body,
    /// Fixed to the world, z up.
    World,
}

/// Requested acceleration of the vehicle. `tx, ty, tz` are linear
/// accelerations and `rx, ry, rz` angular accelerations about x, y and z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wrench {
    pub tx: f64,
    pub ty: f64,
    pub tz: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
    pub frame: Frame,
}

impl Wrench {
    pub const fn zero(frame: Frame) -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            tz: 0.0,
            rx: 0.0,
            ry: 0.0,
            rz: 0.0,
            frame,
        }
    }

    pub const fn body() -> Self {
        Self::zero(Frame::Body)
    }

    pub const fn world() -> Self {
        Self::zero(Frame::World)
    }

    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>, frame: Frame) -> Self {
        Self::from_components(
            [linear[0], linear[1], linear[2], angular[0], angular[1], angular[2]],
            frame,
        )
    }

    /// Builds a wrench from `[tx, ty, tz, rx, ry, rz]`.
    pub fn from_components(c: [f64; 6], frame: Frame) -> Self {
        Self {
            tx: c[0],
            ty: c[1],
            tz: c[2],
            rx: c[3],
            ry: c[4],
            rz: c[5],
            frame,
        }
    }

    pub fn with_tx(mut self, tx: f64) -> Self {
        self.tx = tx;
        self
    }

    pub fn with_ty(mut self, ty: f64) -> Self {
        self.ty = ty;
        self
    }

    pub fn with_tz(mut self, tz: f64) -> Self {
        self.tz = tz;
        self
    }

    pub fn with_rx(mut self, rx: f64) -> Self {
        self.rx = rx;
        self
    }

    pub fn with_ry(mut self, ry: f64) -> Self {
        self.ry = ry;
        self
    }

    pub fn with_rz(mut self, rz: f64) -> Self {
        self.rz = rz;
        self
    }

    pub fn components(&self) -> [f64; 6] {
        [self.tx, self.ty, self.tz, self.rx, self.ry, self.rz]
    }

    pub fn linear(&self) -> Vector3<f64> {
        Vector3::new(self.tx, self.ty, self.tz)
    }

    pub fn angular(&self) -> Vector3<f64> {
        Vector3::new(self.rx, self.ry, self.rz)
    }

    pub fn vector(&self) -> Vector6<f64> {
        Vector6::from(self.components())
    }

    pub fn is_finite(&self) -> bool {
        self.components().iter().all(|c| c.is_finite())
    }

    pub fn is_zero(&self) -> bool {
        self.components().iter().all(|c| *c == 0.0)
    }
}
