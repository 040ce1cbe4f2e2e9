use crate::{
    MissionErrors,
    behavior::{BehaviorResult, Task},
};
use allocation::Wrench;
use hardware::SensorSnapshot;
use std::error::Error;

/// Holds a constant demand for `duration` seconds of sensor time, counted
/// from the first tick the task runs.
#[derive(Debug, Clone)]
pub struct AccelerateVector {
    wrench: Wrench,
    duration: f64,
    start: Option<f64>,
    finished: bool,
}

impl AccelerateVector {
    pub fn new(wrench: Wrench, duration: f64) -> Result<Self, MissionErrors> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(MissionErrors::InvalidDuration(duration));
        }
        if !wrench.is_finite() {
            return Err(MissionErrors::NonFiniteWrench);
        }
        Ok(Self {
            wrench,
            duration,
            start: None,
            finished: false,
        })
    }
}

impl Task for AccelerateVector {
    fn name(&self) -> &str {
        "accelerate vector"
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn produce(&mut self, sensors: &SensorSnapshot) -> BehaviorResult {
        let start = *self.start.get_or_insert(sensors.time);
        self.finished = sensors.time - start >= self.duration;
        Ok(self.wrench)
    }
}

/// Zero demand for `duration` seconds, subtasks keep running.
#[derive(Debug, Clone)]
pub struct Wait {
    inner: AccelerateVector,
}

impl Wait {
    pub fn new(duration: f64) -> Result<Self, MissionErrors> {
        Ok(Self {
            inner: AccelerateVector::new(Wrench::body(), duration)?,
        })
    }
}

impl Task for Wait {
    fn name(&self) -> &str {
        "wait"
    }

    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    fn produce(&mut self, sensors: &SensorSnapshot) -> BehaviorResult {
        self.inner.produce(sensors)
    }
}

type Callback = Box<dyn FnMut() -> Result<(), Box<dyn Error>>>;

/// Runs a closure on its first tick and finishes. Contributes nothing.
pub struct RunFunction {
    name: String,
    function: Callback,
    run: bool,
}

impl RunFunction {
    pub fn new(
        name: impl Into<String>,
        function: impl FnMut() -> Result<(), Box<dyn Error>> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            function: Box::new(function),
            run: false,
        }
    }
}

impl Task for RunFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_finished(&self) -> bool {
        self.run
    }

    fn produce(&mut self, _sensors: &SensorSnapshot) -> BehaviorResult {
        if !self.run {
            (self.function)()?;
            self.run = true;
        }
        Ok(Wrench::body())
    }
}
