pub mod actuator;
pub mod clock;
pub mod sensor;

pub use actuator::{ActuatorSink, RecordingSink, validate_command};
pub use clock::{Clock, SystemClock};
pub use sensor::{ImuReading, Measurement, SensorInterface, SensorSnapshot, SensorSource};

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HardwareErrors {
    #[error("actuator command {0} is outside [-1, 1]")]
    CommandOutOfRange(f64),
    #[error("device '{0}' disconnected")]
    Disconnected(String),
    #[error("device '{0}' failed: {1}")]
    Device(String, String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("got non-finite actuator command")]
    NonFiniteCommand,
    #[error("sensor '{0}' produced a non-finite reading")]
    NonFiniteReading(String),
    #[error("'{0}' did not respond within {1:?}")]
    Timeout(String, Duration),
}

impl HardwareErrors {
    /// True for errors caused by a device not answering in time.
    pub fn is_timeout(&self) -> bool {
        match self {
            HardwareErrors::Timeout(..) => true,
            HardwareErrors::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}
