pub mod config;
pub mod setup;
pub mod vehicle;

pub use config::{ConfigErrors, HeadingHold, MassSource, MissionConfig, TaskConfig, VehicleConfig};
pub use setup::{build_simulation, remote_vehicle, simulated_vehicle};
pub use vehicle::{Auv, FinishPolicy, MissionOutcome, StopHandle, VehicleSettings};

use allocation::AllocationErrors;
use hardware::HardwareErrors;
use relay::RelayErrors;
use results::ResultErrors;
use simulation::SimulationErrors;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuvErrors {
    #[error("{0}")]
    Allocation(#[from] AllocationErrors),
    #[error("{0}")]
    Config(#[from] ConfigErrors),
    #[error("{0}")]
    Hardware(#[from] HardwareErrors),
    #[error("{0}")]
    Relay(#[from] RelayErrors),
    #[error("{0}")]
    Results(#[from] ResultErrors),
    #[error("{0}")]
    Simulation(#[from] SimulationErrors),
}
