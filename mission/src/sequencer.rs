use crate::behavior::{Path, Subtask, Task};
use allocation::{Frame, Wrench};
use hardware::SensorSnapshot;
use rotations::prelude::{RotationTrait, UnitQuaternion};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MissionState {
    /// Index of the active task.
    Running(usize),
    Finished,
    Aborted(String),
}

impl MissionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MissionState::Running(_))
    }
}

/// One tick's demand, body and world contributions kept apart until the
/// attitude is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrenchTotal {
    pub body: Wrench,
    pub world: Wrench,
}

impl Default for WrenchTotal {
    fn default() -> Self {
        Self {
            body: Wrench::body(),
            world: Wrench::world(),
        }
    }
}

impl WrenchTotal {
    /// Adds up contributions in a way that does not depend on their order.
    pub fn sum(contributions: &[Wrench]) -> Self {
        let body: Vec<Wrench> = contributions
            .iter()
            .filter(|w| w.frame == Frame::Body)
            .copied()
            .collect();
        let world: Vec<Wrench> = contributions
            .iter()
            .filter(|w| w.frame == Frame::World)
            .copied()
            .collect();
        Self {
            body: sum_frame(&body, Frame::Body),
            world: sum_frame(&world, Frame::World),
        }
    }

    /// Single body-frame demand, rotating the world part with `attitude`
    /// (body to world).
    pub fn resolve(&self, attitude: &UnitQuaternion) -> Wrench {
        let linear = self.body.linear() + attitude.transform(&self.world.linear());
        let angular = self.body.angular() + attitude.transform(&self.world.angular());
        Wrench::new(linear, angular, Frame::Body)
    }
}

/// Component-wise sum with the values of each component sorted first, so
/// every permutation of the inputs rounds the same way.
fn sum_frame(wrenches: &[Wrench], frame: Frame) -> Wrench {
    let mut total = [0.0; 6];
    let mut column = Vec::with_capacity(wrenches.len());
    for (k, value) in total.iter_mut().enumerate() {
        column.clear();
        column.extend(wrenches.iter().map(|w| w.components()[k]));
        column.sort_by(f64::total_cmp);
        *value = column.iter().sum();
    }
    Wrench::from_components(total, frame)
}

/// Tick-driven state machine over a [`Path`] plus persistent subtasks.
pub struct Sequencer {
    tasks: Vec<Box<dyn Task>>,
    subtasks: Vec<Box<dyn Subtask>>,
    state: MissionState,
}

impl Sequencer {
    pub fn new(path: Path, subtasks: Vec<Box<dyn Subtask>>) -> Self {
        let state = if path.tasks.is_empty() {
            MissionState::Finished
        } else {
            MissionState::Running(0)
        };
        Self {
            tasks: path.tasks,
            subtasks,
            state,
        }
    }

    pub fn state(&self) -> &MissionState {
        &self.state
    }

    pub fn active_task(&self) -> Option<&str> {
        match self.state {
            MissionState::Running(i) => Some(self.tasks[i].name()),
            _ => None,
        }
    }

    /// Evaluates the active task then every subtask and returns the summed
    /// demand. Returns `None` once the mission is over, including when a
    /// behavior fails during this tick; no behavior runs after a failure.
    pub fn tick(&mut self, sensors: &SensorSnapshot) -> Option<WrenchTotal> {
        let MissionState::Running(index) = self.state else {
            return None;
        };

        let mut contributions = Vec::with_capacity(1 + self.subtasks.len());
        let task = &mut self.tasks[index];
        match task.produce(sensors) {
            Ok(w) => contributions.push(w),
            Err(e) => {
                let reason = format!("task '{}' failed: {e}", task.name());
                self.abort(reason);
                return None;
            }
        }
        let task_done = task.is_finished();

        let mut failure = None;
        for subtask in &mut self.subtasks {
            match subtask.produce(sensors) {
                Ok(w) => contributions.push(w),
                Err(e) => {
                    failure = Some(format!("subtask '{}' failed: {e}", subtask.name()));
                    break;
                }
            }
        }
        if let Some(reason) = failure {
            self.abort(reason);
            return None;
        }

        if task_done {
            log::info!("task '{}' finished", self.tasks[index].name());
            self.state = if index + 1 < self.tasks.len() {
                log::info!("starting task '{}'", self.tasks[index + 1].name());
                MissionState::Running(index + 1)
            } else {
                log::info!("mission finished");
                MissionState::Finished
            };
        }

        Some(WrenchTotal::sum(&contributions))
    }

    /// Stops the mission. Does nothing if it already ended.
    pub fn abort(&mut self, reason: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        let reason = reason.into();
        log::warn!("mission aborted: {reason}");
        self.state = MissionState::Aborted(reason);
    }

    /// Hands the subtasks back so they can be reused for another mission.
    pub fn into_subtasks(self) -> Vec<Box<dyn Subtask>> {
        self.subtasks
    }
}
