use crate::{SimulationErrors, record::Recorder};
use allocation::ThrusterModel;
use mass_properties::{CenterOfMass, Inertia, MassProperties};
use nalgebra::{Matrix3, Vector3};
use rotations::prelude::{RotationTrait, UnitQuaternion};
use relay::{ImuPacket, TelemetrySource};
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, error::Error, path::Path, rc::Rc};

pub type SimulationRef = Rc<RefCell<Simulation>>;

/// Kinematic state of the vehicle, world frame unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyState {
    pub position: Vector3<f64>,
    /// Rotation taking body vectors into the world frame.
    pub attitude: UnitQuaternion,
    pub velocity: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
    /// Linear acceleration from the last step.
    pub acceleration: Vector3<f64>,
}

impl Default for RigidBodyState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            attitude: UnitQuaternion::IDENTITY,
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
        }
    }
}

/// Rigid body pushed around by its thrusters. No drag, no gravity or
/// buoyancy: with every thruster off the body coasts.
#[derive(Debug)]
pub struct Simulation {
    mass_properties: MassProperties,
    thrusters: Vec<ThrusterModel>,
    commands: Vec<f64>,
    state: RigidBodyState,
    time: f64,
    recorder: Option<Recorder>,
}

impl Simulation {
    pub fn new(
        mass: f64,
        inertia: Inertia,
        thrusters: Vec<ThrusterModel>,
    ) -> Result<Self, SimulationErrors> {
        let inertia = Inertia::try_from(inertia.matrix())?;
        let mass_properties = MassProperties::new(mass, CenterOfMass::default(), inertia)?;
        let commands = vec![0.0; thrusters.len()];
        Ok(Self {
            mass_properties,
            thrusters,
            commands,
            state: RigidBodyState::default(),
            time: 0.0,
            recorder: None,
        })
    }

    /// Point the body rotates about, in the same frame as the thruster
    /// positions. `state.position` tracks this point.
    pub fn with_center_of_mass(mut self, center_of_mass: CenterOfMass) -> Self {
        self.mass_properties.center_of_mass = center_of_mass;
        self
    }

    pub fn with_state(mut self, state: RigidBodyState) -> Self {
        self.state = state;
        self
    }

    /// Writes state and commands to csv files under `path` after every step.
    pub fn with_recording(mut self, path: &Path) -> Result<Self, SimulationErrors> {
        self.recorder = Some(Recorder::new(path, self.thrusters.len())?);
        Ok(self)
    }

    /// Flushes any recorded rows to disk.
    pub fn flush_results(&mut self) -> Result<(), SimulationErrors> {
        match &mut self.recorder {
            Some(recorder) => recorder.flush(),
            None => Ok(()),
        }
    }

    pub fn shared(self) -> SimulationRef {
        Rc::new(RefCell::new(self))
    }

    pub fn state(&self) -> &RigidBodyState {
        &self.state
    }

    /// Simulated seconds since the start.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn thrusters(&self) -> &[ThrusterModel] {
        &self.thrusters
    }

    pub fn commands(&self) -> &[f64] {
        &self.commands
    }

    pub fn set_command(&mut self, index: usize, command: f64) -> Result<(), SimulationErrors> {
        if !command.is_finite() || !(-1.0..=1.0).contains(&command) {
            return Err(SimulationErrors::InvalidCommand(index, command));
        }
        let slot = self
            .commands
            .get_mut(index)
            .ok_or(SimulationErrors::NoSuchThruster(index))?;
        *slot = command;
        Ok(())
    }

    pub fn stop_all(&mut self) {
        self.commands.iter_mut().for_each(|c| *c = 0.0);
    }

    /// Net force and torque of the current commands, body frame.
    pub fn body_wrench(&self) -> (Vector3<f64>, Vector3<f64>) {
        let center = self.mass_properties.center_of_mass.vector();
        let mut force = Vector3::zeros();
        let mut torque = Vector3::zeros();
        for (thruster, command) in self.thrusters.iter().zip(&self.commands) {
            let thrust = thruster.thrust(*command);
            force += thrust * thruster.direction();
            torque += thrust * thruster.moment_arm(&center);
        }
        (force, torque)
    }

    /// Acceleration as an accelerometer bolted to the hull would see it.
    pub fn body_acceleration(&self) -> Vector3<f64> {
        self.state.attitude.transform(&self.state.acceleration)
    }

    /// Advances the body by `dt` seconds of semi-implicit Euler.
    pub fn step(&mut self, dt: f64) -> Result<(), SimulationErrors> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimulationErrors::InvalidTimestep(dt));
        }
        let (force_body, torque_body) = self.body_wrench();
        let attitude = self.state.attitude;
        let force = attitude.rotate(&force_body);
        let torque = attitude.rotate(&torque_body);

        let acceleration = force / self.mass_properties.mass;
        let velocity = self.state.velocity + acceleration * dt;
        let position = self.state.position + velocity * dt;

        let r: Matrix3<f64> = attitude.matrix();
        let inertia_world = r * self.mass_properties.inertia.matrix() * r.transpose();
        let inertia_inv = inertia_world
            .try_inverse()
            .ok_or(SimulationErrors::SingularInertia)?;
        let angular_velocity = self.state.angular_velocity + inertia_inv * torque * dt;
        let delta = UnitQuaternion::from_rotation_vector(&(angular_velocity * dt))?;
        let attitude = (delta * attitude).renormalize()?;

        let next = RigidBodyState {
            position,
            attitude,
            velocity,
            angular_velocity,
            acceleration,
        };
        if !next
            .position
            .iter()
            .chain(next.velocity.iter())
            .chain(next.angular_velocity.iter())
            .all(|v| v.is_finite())
        {
            return Err(SimulationErrors::NonFiniteState);
        }
        self.state = next;
        self.time += dt;

        if let Some(recorder) = &mut self.recorder {
            recorder.write(self.time, &self.state, &self.commands)?;
        }
        Ok(())
    }
}

impl TelemetrySource for Simulation {
    fn set_command(&mut self, index: usize, command: f64) -> Result<(), Box<dyn Error>> {
        Ok(Simulation::set_command(self, index, command)?)
    }

    fn advance(&mut self, dt: f64) -> Result<(), Box<dyn Error>> {
        Ok(self.step(dt)?)
    }

    fn telemetry(&self) -> ImuPacket {
        ImuPacket {
            attitude: self.state.attitude,
            acceleration: self.body_acceleration(),
        }
    }

    fn stop_all(&mut self) {
        Simulation::stop_all(self);
        if let Err(e) = self.flush_results() {
            log::error!("could not flush simulation results: {e}");
        }
    }
}
