pub mod allocator;
pub mod curve;
pub mod solver;
pub mod thruster;
pub mod wrench;

pub use allocator::{Allocation, Allocator};
pub use curve::ResponseCurve;
pub use solver::{BoundedLeastSquares, SolverErrors};
pub use thruster::{Range, Thruster, ThrusterBuilder, ThrusterErrors, ThrusterModel};
pub use wrench::{Frame, Wrench};

use hardware::HardwareErrors;
use mass_properties::MassPropertiesErrors;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocationErrors {
    #[error("weight {0} must be finite and non-negative")]
    InvalidWeight(f64),
    #[error("regularization {0} must be finite and non-negative")]
    InvalidRegularization(f64),
    #[error("{0}")]
    MassProperties(#[from] MassPropertiesErrors),
    #[error("allocator needs at least one thruster")]
    NoThrusters,
    #[error("demand has non-finite components: {0:?}")]
    NonFiniteDemand(Wrench),
    #[error("thruster {0} sink failed: {1}")]
    Sink(usize, #[source] HardwareErrors),
    #[error("{0}")]
    Solver(#[from] SolverErrors),
    #[error("thruster {0}: {1}")]
    Thruster(usize, #[source] ThrusterErrors),
    #[error("demand must be resolved into the body frame before allocation")]
    WorldFrameDemand,
}
