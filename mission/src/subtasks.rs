use crate::{
    MissionErrors,
    behavior::{BehaviorResult, Subtask},
};
use allocation::Wrench;
use hardware::SensorSnapshot;
use rotations::wrap_angle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

/// Holds a world heading by demanding body yaw acceleration.
#[derive(Debug, Clone)]
pub struct HeadingPid {
    target: f64,
    gains: PidGains,
    limit: Option<f64>,
    integral: f64,
    last: Option<(f64, f64)>,
}

impl HeadingPid {
    pub fn new(target: f64, gains: PidGains) -> Self {
        Self {
            target: wrap_angle(target),
            gains,
            limit: None,
            integral: 0.0,
            last: None,
        }
    }

    /// Caps the magnitude of the yaw demand.
    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit.abs());
        self
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn set_target(&mut self, target: f64) {
        self.target = wrap_angle(target);
        self.integral = 0.0;
        self.last = None;
    }
}

impl Subtask for HeadingPid {
    fn name(&self) -> &str {
        "heading pid"
    }

    fn produce(&mut self, sensors: &SensorSnapshot) -> BehaviorResult {
        let imu = sensors
            .imu
            .ok_or_else(|| MissionErrors::MissingImu(self.name().to_string()))?;
        let error = wrap_angle(self.target - imu.attitude.yaw());

        let mut derivative = 0.0;
        if let Some((time, last_error)) = self.last {
            let dt = sensors.time - time;
            if dt > 0.0 {
                self.integral += error * dt;
                derivative = wrap_angle(error - last_error) / dt;
            }
        }
        self.last = Some((sensors.time, error));

        let PidGains { kp, ki, kd } = self.gains;
        let mut output = kp * error + ki * self.integral + kd * derivative;
        if let Some(limit) = self.limit {
            output = output.clamp(-limit, limit);
        }
        Ok(Wrench::body().with_rz(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hardware::ImuReading;
    use nalgebra::Vector3;
    use rotations::prelude::UnitQuaternion;
    use std::f64::consts::PI;

    fn heading(time: f64, yaw: f64) -> SensorSnapshot {
        SensorSnapshot::new(time)
            .with_imu(ImuReading::new(UnitQuaternion::from_yaw(yaw), Vector3::zeros()))
    }

    #[test]
    fn test_turns_the_short_way() {
        let mut pid = HeadingPid::new(0.9 * PI, PidGains::new(1.0, 0.0, 0.0));
        // from -0.9 pi the short way to +0.9 pi is negative
        let w = pid.produce(&heading(0.0, -0.9 * PI)).unwrap();
        assert_abs_diff_eq!(w.rz, -0.2 * PI, epsilon = 1e-9);
        assert!(w.tx == 0.0 && w.ty == 0.0);
    }

    #[test]
    fn test_integral_and_derivative() {
        let mut pid = HeadingPid::new(0.5, PidGains::new(0.0, 1.0, 1.0));
        pid.produce(&heading(0.0, 0.0)).unwrap();
        let w = pid.produce(&heading(0.5, 0.25)).unwrap();
        // integral 0.25 * 0.5, derivative (0.25 - 0.5) / 0.5
        assert_abs_diff_eq!(w.rz, 0.125 - 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_limit() {
        let mut pid = HeadingPid::new(1.0, PidGains::new(10.0, 0.0, 0.0)).with_limit(2.0);
        let w = pid.produce(&heading(0.0, 0.0)).unwrap();
        assert_eq!(w.rz, 2.0);
    }

    #[test]
    fn test_needs_imu() {
        let mut pid = HeadingPid::new(0.0, PidGains::new(1.0, 0.0, 0.0));
        assert!(pid.produce(&SensorSnapshot::new(0.0)).is_err());
    }
}
