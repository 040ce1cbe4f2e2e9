use crate::{SimulationErrors, SimulationRef};
use hardware::{
    ActuatorSink, Clock, HardwareErrors, ImuReading, Measurement, SensorSource, validate_command,
};
use nalgebra::Vector3;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rand_distr::{Distribution, Normal};
use rotations::prelude::{RotationTrait, UnitQuaternion};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gaussian noise for the simulated IMU. Deviations are one sigma,
/// acceleration in m/s^2 per axis and attitude in radians about a random
/// axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuNoise {
    pub acceleration_deviation: f64,
    pub attitude_deviation: f64,
    pub seed: u64,
}

impl Default for ImuNoise {
    fn default() -> Self {
        Self {
            acceleration_deviation: 0.0,
            attitude_deviation: 0.0,
            seed: 0,
        }
    }
}

#[derive(Debug)]
struct NoiseSampler {
    acceleration: Normal<f64>,
    attitude: Normal<f64>,
    rng: SmallRng,
}

impl NoiseSampler {
    fn new(noise: &ImuNoise) -> Result<Self, SimulationErrors> {
        Ok(Self {
            acceleration: Normal::new(0.0, noise.acceleration_deviation)?,
            attitude: Normal::new(0.0, noise.attitude_deviation)?,
            rng: SmallRng::seed_from_u64(noise.seed),
        })
    }

    fn acceleration(&mut self) -> Vector3<f64> {
        Vector3::from_fn(|_, _| self.acceleration.sample(&mut self.rng))
    }

    fn attitude(&mut self) -> Result<UnitQuaternion, SimulationErrors> {
        let angle = self.attitude.sample(&mut self.rng);
        // uniform direction on the sphere
        let z: f64 = self.rng.random_range(-1.0..=1.0);
        let phi: f64 = self.rng.random_range(0.0..std::f64::consts::TAU);
        let r = (1.0 - z * z).sqrt();
        let axis = Vector3::new(r * phi.cos(), r * phi.sin(), z);
        Ok(UnitQuaternion::from_rotation_vector(&(axis * angle))?)
    }
}

/// Attitude and body-frame acceleration read straight from the simulation.
#[derive(Debug)]
pub struct FakeImu {
    sim: SimulationRef,
    noise: Option<NoiseSampler>,
}

impl FakeImu {
    pub fn new(sim: SimulationRef) -> Self {
        Self { sim, noise: None }
    }

    pub fn with_noise(mut self, noise: ImuNoise) -> Result<Self, SimulationErrors> {
        self.noise = Some(NoiseSampler::new(&noise)?);
        Ok(self)
    }

    fn reading(&mut self) -> Result<ImuReading, SimulationErrors> {
        let sim = self.sim.borrow();
        let state = sim.state();
        let mut attitude = state.attitude;
        let mut acceleration = sim.body_acceleration();
        let rate = attitude.transform(&state.angular_velocity);
        if let Some(noise) = &mut self.noise {
            acceleration += noise.acceleration();
            attitude = (noise.attitude()? * attitude).renormalize()?;
        }
        Ok(ImuReading::new(attitude, acceleration).with_rate(rate))
    }
}

impl SensorSource for FakeImu {
    fn name(&self) -> &str {
        "fake imu"
    }

    fn read(&mut self, _timeout: Duration) -> Result<Measurement, HardwareErrors> {
        self.reading()
            .map(Measurement::Imu)
            .map_err(|e| HardwareErrors::Device(self.name().to_string(), e.to_string()))
    }
}

/// Depth below the surface, positive down, taken as `-z`.
#[derive(Debug)]
pub struct FakeDepth {
    sim: SimulationRef,
}

impl FakeDepth {
    pub fn new(sim: SimulationRef) -> Self {
        Self { sim }
    }
}

impl SensorSource for FakeDepth {
    fn name(&self) -> &str {
        "fake depth"
    }

    fn read(&mut self, _timeout: Duration) -> Result<Measurement, HardwareErrors> {
        Ok(Measurement::Depth(-self.sim.borrow().state().position[2]))
    }
}

/// Reports simulated time, so the vehicle's clock only moves when the
/// simulation steps.
#[derive(Debug)]
pub struct FakeClock {
    sim: SimulationRef,
}

impl FakeClock {
    pub fn new(sim: SimulationRef) -> Self {
        Self { sim }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> f64 {
        self.sim.borrow().time()
    }
}

/// Writes one thruster's command into the simulation.
#[derive(Debug)]
pub struct SimulatedThruster {
    sim: SimulationRef,
    index: usize,
}

impl SimulatedThruster {
    pub fn new(sim: SimulationRef, index: usize) -> Self {
        Self { sim, index }
    }
}

impl ActuatorSink for SimulatedThruster {
    fn send(&mut self, command: f64) -> Result<(), HardwareErrors> {
        let command = validate_command(command)?;
        self.sim
            .borrow_mut()
            .set_command(self.index, command)
            .map_err(|e| {
                HardwareErrors::Device(format!("simulated thruster {}", self.index), e.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RigidBodyState, Simulation};
    use allocation::{ResponseCurve, ThrusterBuilder};
    use approx::assert_abs_diff_eq;
    use mass_properties::Inertia;

    fn sim() -> SimulationRef {
        let thruster = ThrusterBuilder::new(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::zeros(),
            ResponseCurve::linear(1.0),
        )
        .model()
        .unwrap();
        let state = RigidBodyState {
            position: Vector3::new(0.0, 0.0, -3.0),
            attitude: UnitQuaternion::from_yaw(0.3),
            ..Default::default()
        };
        Simulation::new(1.0, Inertia::new(1.0, 1.0, 1.0, 0.0, 0.0, 0.0).unwrap(), vec![thruster])
            .unwrap()
            .with_state(state)
            .shared()
    }

    #[test]
    fn test_sensors_follow_simulation() {
        let sim = sim();
        let mut imu = FakeImu::new(sim.clone());
        let mut depth = FakeDepth::new(sim.clone());
        let clock = FakeClock::new(sim.clone());
        let mut thruster = SimulatedThruster::new(sim.clone(), 0);

        thruster.send(0.5).unwrap();
        sim.borrow_mut().step(0.25).unwrap();

        let Measurement::Imu(reading) = imu.read(Duration::ZERO).unwrap() else {
            panic!("expected an imu measurement");
        };
        assert_abs_diff_eq!(reading.attitude.yaw(), 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(reading.acceleration[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(reading.acceleration[1], 0.0, epsilon = 1e-12);
        assert_eq!(depth.read(Duration::ZERO).unwrap(), Measurement::Depth(3.0));
        assert_eq!(clock.now(), 0.25);
    }

    #[test]
    fn test_simulated_thruster_rejects_bad_commands() {
        let sim = sim();
        assert!(SimulatedThruster::new(sim.clone(), 0).send(1.2).is_err());
        assert!(matches!(
            SimulatedThruster::new(sim.clone(), 3).send(0.2),
            Err(HardwareErrors::Device(..))
        ));
        assert_eq!(sim.borrow().commands(), &[0.0]);
    }

    #[test]
    fn test_noise_is_seeded() {
        let noise = ImuNoise {
            acceleration_deviation: 0.1,
            attitude_deviation: 0.01,
            seed: 42,
        };
        let sim = sim();
        let mut a = FakeImu::new(sim.clone()).with_noise(noise).unwrap();
        let mut b = FakeImu::new(sim.clone()).with_noise(noise).unwrap();
        let ra = a.reading().unwrap();
        let rb = b.reading().unwrap();
        assert_eq!(ra, rb);
        assert!(ra.acceleration.norm() > 0.0);
        assert!(ra.attitude.angle_to(&sim.borrow().state().attitude) < 0.1);
    }

    #[test]
    fn test_negative_deviation_rejected() {
        let noise = ImuNoise {
            acceleration_deviation: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            FakeImu::new(sim()).with_noise(noise),
            Err(SimulationErrors::Noise(_))
        ));
    }
}
