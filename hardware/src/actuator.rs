use crate::HardwareErrors;
use std::{cell::RefCell, rc::Rc};

/// Destination for one thruster's normalized command.
pub trait ActuatorSink {
    /// Sends `command`, a fraction of full power in [-1, 1].
    fn send(&mut self, command: f64) -> Result<(), HardwareErrors>;
}

/// Checks that a command is something a motor driver can accept.
pub fn validate_command(command: f64) -> Result<f64, HardwareErrors> {
    if !command.is_finite() {
        return Err(HardwareErrors::NonFiniteCommand);
    }
    if !(-1.0..=1.0).contains(&command) {
        return Err(HardwareErrors::CommandOutOfRange(command));
    }
    Ok(command)
}

/// Keeps every command it receives. Clones share the same history, so a test
/// or bench harness can hand one clone to the allocator and inspect another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    history: Rc<RefCell<Vec<f64>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<f64> {
        self.history.borrow().last().copied()
    }

    pub fn history(&self) -> Vec<f64> {
        self.history.borrow().clone()
    }
}

impl ActuatorSink for RecordingSink {
    fn send(&mut self, command: f64) -> Result<(), HardwareErrors> {
        let command = validate_command(command)?;
        self.history.borrow_mut().push(command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_command() {
        assert_eq!(validate_command(-1.0).unwrap(), -1.0);
        assert_eq!(validate_command(0.3).unwrap(), 0.3);
        assert!(matches!(
            validate_command(1.5),
            Err(HardwareErrors::CommandOutOfRange(_))
        ));
        assert!(matches!(
            validate_command(f64::NAN),
            Err(HardwareErrors::NonFiniteCommand)
        ));
    }

    #[test]
    fn test_recording_sink_shares_history() {
        let sink = RecordingSink::new();
        let mut handle = sink.clone();
        handle.send(0.25).unwrap();
        handle.send(0.0).unwrap();
        assert!(handle.send(2.0).is_err());
        assert_eq!(sink.history(), vec![0.25, 0.0]);
        assert_eq!(sink.last(), Some(0.0));
    }
}
