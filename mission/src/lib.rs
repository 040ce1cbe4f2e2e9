pub mod behavior;
pub mod sequencer;
pub mod subtasks;
pub mod tasks;

pub use behavior::{BehaviorResult, Path, Subtask, Task};
pub use sequencer::{MissionState, Sequencer, WrenchTotal};
pub use subtasks::{HeadingPid, PidGains};
pub use tasks::{AccelerateVector, RunFunction, Wait};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MissionErrors {
    #[error("duration {0} must be finite and non-negative")]
    InvalidDuration(f64),
    #[error("'{0}' needs an imu reading")]
    MissingImu(String),
    #[error("demand has non-finite components")]
    NonFiniteWrench,
}
