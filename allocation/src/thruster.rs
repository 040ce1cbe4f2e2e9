use crate::curve::ResponseCurve;
use hardware::{ActuatorSink, HardwareErrors};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThrusterErrors {
    #[error("bounds [{0}, {1}] must satisfy min < max")]
    InvertedBounds(f64, f64),
    #[error("bounds [{0}, {1}] must contain zero")]
    BoundsExcludeZero(f64, f64),
    #[error("bounds [{0}, {1}] must lie inside [-1, 1]")]
    BoundsOutsideUnit(f64, f64),
    #[error("deadzone [{0}, {1}] must satisfy lo <= 0 <= hi")]
    InvalidDeadzone(f64, f64),
    #[error("response curve is not strictly increasing over the command bounds")]
    NonMonotonicCurve,
    #[error("thruster geometry must be finite")]
    NonFinite,
    #[error("direction must have non-zero length")]
    ZeroDirection,
}

/// Closed interval of normalized commands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    /// True when `value` lies strictly between the ends.
    pub fn strictly_contains(&self, value: f64) -> bool {
        self.min < value && value < self.max
    }
}

/// Everything about a thruster except where its commands go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrusterBuilder {
    pub direction: Vector3<f64>,
    pub position: Vector3<f64>,
    pub curve: ResponseCurve,
    pub bounds: Range,
    pub deadzone: Range,
}

impl ThrusterBuilder {
    pub fn new(direction: Vector3<f64>, position: Vector3<f64>, curve: ResponseCurve) -> Self {
        Self {
            direction,
            position,
            curve,
            bounds: Range::new(-1.0, 1.0),
            deadzone: Range::new(0.0, 0.0),
        }
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.bounds = Range::new(min, max);
        self
    }

    pub fn with_deadzone(mut self, lo: f64, hi: f64) -> Self {
        self.deadzone = Range::new(lo, hi);
        self
    }

    pub fn validate(&self) -> Result<(), ThrusterErrors> {
        let Range { min, max } = self.bounds;
        let Range { min: lo, max: hi } = self.deadzone;
        if !self.direction.iter().chain(self.position.iter()).all(|v| v.is_finite())
            || ![min, max, lo, hi].iter().all(|v| v.is_finite())
        {
            return Err(ThrusterErrors::NonFinite);
        }
        if self.direction.norm() < 1e-12 {
            return Err(ThrusterErrors::ZeroDirection);
        }
        if min >= max {
            return Err(ThrusterErrors::InvertedBounds(min, max));
        }
        if min > 0.0 || max < 0.0 {
            return Err(ThrusterErrors::BoundsExcludeZero(min, max));
        }
        if min < -1.0 || max > 1.0 {
            return Err(ThrusterErrors::BoundsOutsideUnit(min, max));
        }
        if lo > 0.0 || hi < 0.0 {
            return Err(ThrusterErrors::InvalidDeadzone(lo, hi));
        }
        if !self.curve.is_increasing_on(min, max) {
            return Err(ThrusterErrors::NonMonotonicCurve);
        }
        Ok(())
    }

    /// Validated model without an output, as used by the simulator.
    pub fn model(&self) -> Result<ThrusterModel, ThrusterErrors> {
        self.validate()?;
        Ok(ThrusterModel {
            direction: self.direction.normalize(),
            position: self.position,
            curve: self.curve.clone(),
            bounds: self.bounds,
            deadzone: self.deadzone,
        })
    }

    pub fn build(&self, sink: Box<dyn ActuatorSink>) -> Result<Thruster, ThrusterErrors> {
        Ok(Thruster {
            model: self.model()?,
            sink,
        })
    }
}

/// Geometry and command response of a thruster. Pure, shared by the
/// allocator and the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrusterModel {
    direction: Vector3<f64>,
    position: Vector3<f64>,
    curve: ResponseCurve,
    bounds: Range,
    deadzone: Range,
}

impl ThrusterModel {
    /// Unit thrust axis, body frame.
    pub fn direction(&self) -> Vector3<f64> {
        self.direction
    }

    /// Mounting point relative to the center of mass, body frame.
    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn curve(&self) -> &ResponseCurve {
        &self.curve
    }

    pub fn bounds(&self) -> Range {
        self.bounds
    }

    pub fn deadzone(&self) -> Range {
        self.deadzone
    }

    /// Torque per unit thrust about `center`, `(position - center) x direction`.
    pub fn moment_arm(&self, center: &Vector3<f64>) -> Vector3<f64> {
        (self.position - center).cross(&self.direction)
    }

    /// Clips to the bounds, then zeroes anything strictly inside the
    /// deadzone. The deadzone ends themselves are valid commands.
    /// Non-finite commands condition to zero.
    pub fn condition(&self, command: f64) -> f64 {
        if !command.is_finite() {
            return 0.0;
        }
        let clipped = command.clamp(self.bounds.min, self.bounds.max);
        if self.deadzone.strictly_contains(clipped) {
            0.0
        } else {
            clipped
        }
    }

    /// Thrust produced by `command` after conditioning. A zero command
    /// stops the motor, whatever the curve's offset.
    pub fn thrust(&self, command: f64) -> f64 {
        let command = self.condition(command);
        if command == 0.0 {
            0.0
        } else {
            self.curve.evaluate(command)
        }
    }

    /// Thrust interval reachable inside the bounds.
    pub fn thrust_range(&self) -> Range {
        Range::new(
            self.curve.evaluate(self.bounds.min),
            self.curve.evaluate(self.bounds.max),
        )
    }

    /// Conditioned command that best realizes `thrust`.
    pub fn command_for(&self, thrust: f64) -> f64 {
        self.condition(self.curve.inverse(thrust, self.bounds.min, self.bounds.max))
    }
}

/// A thruster on the hull and the sink its commands go to.
pub struct Thruster {
    model: ThrusterModel,
    sink: Box<dyn ActuatorSink>,
}

impl std::fmt::Debug for Thruster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thruster")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl std::ops::Deref for Thruster {
    type Target = ThrusterModel;

    fn deref(&self) -> &ThrusterModel {
        &self.model
    }
}

impl Thruster {
    pub fn model(&self) -> &ThrusterModel {
        &self.model
    }

    pub fn send(&mut self, command: f64) -> Result<(), HardwareErrors> {
        self.sink.send(command)
    }

    /// Replaces where commands go and returns the previous sink.
    pub fn set_sink(&mut self, sink: Box<dyn ActuatorSink>) -> Box<dyn ActuatorSink> {
        std::mem::replace(&mut self.sink, sink)
    }
}
