use crate::HardwareErrors;
use nalgebra::Vector3;
use rotations::prelude::UnitQuaternion;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Attitude and motion from an inertial unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuReading {
    /// Rotation taking body vectors into the world frame.
    pub attitude: UnitQuaternion,
    /// Linear acceleration, body frame.
    pub acceleration: Vector3<f64>,
    /// Angular rate, body frame, when the unit reports it.
    pub rate: Option<Vector3<f64>>,
}

impl ImuReading {
    pub fn new(attitude: UnitQuaternion, acceleration: Vector3<f64>) -> Self {
        Self {
            attitude,
            acceleration,
            rate: None,
        }
    }

    pub fn with_rate(mut self, rate: Vector3<f64>) -> Self {
        self.rate = Some(rate);
        self
    }

    fn is_finite(&self) -> bool {
        let q = self.attitude.0;
        [q.x, q.y, q.z, q.w].iter().all(|v| v.is_finite())
            && self.acceleration.iter().all(|v| v.is_finite())
            && self.rate.is_none_or(|r| r.iter().all(|v| v.is_finite()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Measurement {
    Imu(ImuReading),
    /// Depth below the surface in meters, positive down.
    Depth(f64),
}

/// A device the vehicle reads once per tick.
pub trait SensorSource {
    fn name(&self) -> &str;
    /// Returns the latest measurement.
    ///
    /// `timeout` is what is left of the tick's sensor budget. Implementations
    /// that block must return [`HardwareErrors::Timeout`] once it runs out:
    /// the caller cannot interrupt a read, so a source that ignores it stalls
    /// the control loop.
    fn read(&mut self, timeout: Duration) -> Result<Measurement, HardwareErrors>;
}

/// Everything the behaviors see for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub time: f64,
    pub imu: Option<ImuReading>,
    pub depth: Option<f64>,
}

impl SensorSnapshot {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            ..Default::default()
        }
    }

    pub fn with_imu(mut self, imu: ImuReading) -> Self {
        self.imu = Some(imu);
        self
    }

    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// Polls a fixed set of sensors into a [`SensorSnapshot`].
pub struct SensorInterface {
    sources: Vec<Box<dyn SensorSource>>,
    timeout: Duration,
}

impl SensorInterface {
    pub fn new(sources: Vec<Box<dyn SensorSource>>) -> Self {
        Self {
            sources,
            timeout: Duration::from_millis(100),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Reads every source once, all within one shared timeout. Each source
    /// is handed the time remaining. A source that errors, overruns the
    /// budget or returns non-finite values fails the whole snapshot. When
    /// several sources report the same quantity the last one wins.
    pub fn snapshot(&mut self, time: f64) -> Result<SensorSnapshot, HardwareErrors> {
        let mut snapshot = SensorSnapshot::new(time);
        let deadline = Instant::now() + self.timeout;
        for source in &mut self.sources {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HardwareErrors::Timeout(
                    source.name().to_string(),
                    self.timeout,
                ));
            }
            let measurement = source.read(remaining)?;
            if Instant::now() > deadline {
                return Err(HardwareErrors::Timeout(
                    source.name().to_string(),
                    self.timeout,
                ));
            }
            match measurement {
                Measurement::Imu(imu) => {
                    if !imu.is_finite() {
                        return Err(HardwareErrors::NonFiniteReading(source.name().to_string()));
                    }
                    snapshot.imu = Some(imu);
                }
                Measurement::Depth(depth) => {
                    if !depth.is_finite() {
                        return Err(HardwareErrors::NonFiniteReading(source.name().to_string()));
                    }
                    snapshot.depth = Some(depth);
                }
            }
        }
        Ok(snapshot)
    }
}
