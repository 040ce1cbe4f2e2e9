use allocation::Wrench;
use hardware::SensorSnapshot;
use std::error::Error;

pub type BehaviorResult = Result<Wrench, Box<dyn Error>>;

/// One step of a mission. Runs until it reports itself finished.
pub trait Task {
    fn name(&self) -> &str;
    /// Checked after every `produce`.
    fn is_finished(&self) -> bool;
    /// Contribution to this tick's acceleration demand.
    fn produce(&mut self, sensors: &SensorSnapshot) -> BehaviorResult;
}

/// Background behavior evaluated on every tick for the whole mission, such
/// as heading hold or stepping a simulation. Never finishes.
pub trait Subtask {
    fn name(&self) -> &str;
    fn produce(&mut self, sensors: &SensorSnapshot) -> BehaviorResult;
}

/// Ordered list of tasks to run one after another.
#[derive(Default)]
pub struct Path {
    pub tasks: Vec<Box<dyn Task>>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: impl Task + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl From<Vec<Box<dyn Task>>> for Path {
    fn from(tasks: Vec<Box<dyn Task>>) -> Self {
        Self { tasks }
    }
}

impl std::fmt::Debug for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tasks.iter().map(|t| t.name()))
            .finish()
    }
}
