use crate::{RigidBodyState, SimulationErrors};
use results::{RecordResult, ResultErrors, ResultManager};
use rotations::prelude::EulerAngles;
use std::path::Path;

/// Latest step of the simulation as csv rows: one file for the rigid body,
/// one for the thruster commands.
#[derive(Debug, Clone, Default)]
struct StepLog {
    time: f64,
    state: RigidBodyState,
    commands: Vec<f64>,
    state_id: Option<u32>,
    command_id: Option<u32>,
}

impl RecordResult for StepLog {
    fn new_result(&mut self, results: &mut ResultManager) -> Result<(), ResultErrors> {
        let folder = results.result_path.join("simulation");
        let headers = [
            "t",
            "position[x]",
            "position[y]",
            "position[z]",
            "attitude[x]",
            "attitude[y]",
            "attitude[z]",
            "attitude[w]",
            "roll",
            "pitch",
            "yaw",
            "velocity[x]",
            "velocity[y]",
            "velocity[z]",
            "angular_velocity[x]",
            "angular_velocity[y]",
            "angular_velocity[z]",
            "acceleration[x]",
            "acceleration[y]",
            "acceleration[z]",
        ];
        self.state_id = Some(results.new_writer("state", &folder, &headers)?);

        let names: Vec<String> = std::iter::once("t".to_string())
            .chain((0..self.commands.len()).map(|i| format!("command[{i}]")))
            .collect();
        let headers: Vec<&str> = names.iter().map(String::as_str).collect();
        self.command_id = Some(results.new_writer("commands", &folder, &headers)?);
        Ok(())
    }

    fn write_result(&self, results: &mut ResultManager) -> Result<(), ResultErrors> {
        if let Some(id) = self.state_id {
            let s = &self.state;
            let q = s.attitude.0;
            let euler = EulerAngles::from(&s.attitude);
            let row: Vec<String> = [self.time]
                .into_iter()
                .chain(s.position.iter().copied())
                .chain([q.x, q.y, q.z, q.w])
                .chain([euler.roll, euler.pitch, euler.yaw])
                .chain(s.velocity.iter().copied())
                .chain(s.angular_velocity.iter().copied())
                .chain(s.acceleration.iter().copied())
                .map(|v| v.to_string())
                .collect();
            results.write_record(id, &row)?;
        }
        if let Some(id) = self.command_id {
            let row: Vec<String> = std::iter::once(self.time)
                .chain(self.commands.iter().copied())
                .map(|v| v.to_string())
                .collect();
            results.write_record(id, &row)?;
        }
        Ok(())
    }
}

/// Owns the result files of one recorded run. Rows reach disk at least
/// every [`Recorder::FLUSH_EVERY`] steps.
pub(crate) struct Recorder {
    results: ResultManager,
    log: StepLog,
    rows: u64,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("path", &self.results.result_path)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    pub(crate) const FLUSH_EVERY: u64 = 100;

    pub(crate) fn new(path: &Path, thrusters: usize) -> Result<Self, SimulationErrors> {
        let mut results = ResultManager::new(path.to_path_buf());
        let mut log = StepLog {
            commands: vec![0.0; thrusters],
            ..Default::default()
        };
        log.new_result(&mut results)?;
        log::info!("recording simulation to {}", path.display());
        Ok(Self {
            results,
            log,
            rows: 0,
        })
    }

    pub(crate) fn write(
        &mut self,
        time: f64,
        state: &RigidBodyState,
        commands: &[f64],
    ) -> Result<(), SimulationErrors> {
        self.log.time = time;
        self.log.state = *state;
        self.log.commands.clear();
        self.log.commands.extend_from_slice(commands);
        self.log.write_result(&mut self.results)?;
        self.rows += 1;
        if self.rows % Self::FLUSH_EVERY == 0 {
            self.results.flush()?;
        }
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<(), SimulationErrors> {
        Ok(self.results.flush()?)
    }
}
