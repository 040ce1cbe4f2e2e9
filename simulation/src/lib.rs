pub mod body;
pub mod fake;
pub mod record;
pub mod subtask;

pub use body::{RigidBodyState, Simulation, SimulationRef};
pub use fake::{FakeClock, FakeDepth, FakeImu, ImuNoise, SimulatedThruster};
pub use subtask::{Simulate, StepSource};

use mass_properties::MassPropertiesErrors;
use results::ResultErrors;
use rotations::prelude::QuaternionErrors;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationErrors {
    #[error("{0}")]
    MassProperties(#[from] MassPropertiesErrors),
    #[error("invalid noise parameters: {0}")]
    Noise(#[from] rand_distr::NormalError),
    #[error("timestep {0} must be finite and positive")]
    InvalidTimestep(f64),
    #[error("command {1} for thruster {0} must be finite and inside [-1, 1]")]
    InvalidCommand(usize, f64),
    #[error("no thruster with index {0}")]
    NoSuchThruster(usize),
    #[error("simulation state became non-finite")]
    NonFiniteState,
    #[error("{0}")]
    Quaternion(#[from] QuaternionErrors),
    #[error("{0}")]
    Results(#[from] ResultErrors),
    #[error("world inertia is singular")]
    SingularInertia,
}
