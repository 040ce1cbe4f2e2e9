use crate::SimulationRef;
use allocation::Wrench;
use hardware::SensorSnapshot;
use mission::{BehaviorResult, Subtask};
use std::time::Instant;

/// Where the simulated timestep comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepSource {
    /// Wall-clock time since the previous tick. The first tick only
    /// latches the time.
    WallClock(Option<Instant>),
    /// The same step every tick, for deterministic runs.
    Fixed(f64),
}

impl StepSource {
    pub fn wall_clock() -> Self {
        Self::WallClock(None)
    }

    fn next(&mut self) -> Option<f64> {
        match self {
            StepSource::Fixed(dt) => Some(*dt),
            StepSource::WallClock(previous) => {
                let now = Instant::now();
                let dt = previous.map(|p| now.duration_since(p).as_secs_f64());
                *previous = Some(now);
                dt.filter(|dt| *dt > 0.0)
            }
        }
    }
}

/// Advances the simulation once per mission tick. Contributes no demand.
#[derive(Debug)]
pub struct Simulate {
    sim: SimulationRef,
    step: StepSource,
}

impl Simulate {
    pub fn new(sim: SimulationRef) -> Self {
        Self {
            sim,
            step: StepSource::wall_clock(),
        }
    }

    pub fn with_step(mut self, step: StepSource) -> Self {
        self.step = step;
        self
    }
}

impl Subtask for Simulate {
    fn name(&self) -> &str {
        "simulate"
    }

    fn produce(&mut self, _sensors: &SensorSnapshot) -> BehaviorResult {
        if let Some(dt) = self.step.next() {
            self.sim.borrow_mut().step(dt)?;
        }
        Ok(Wrench::body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Simulation;
    use allocation::{ResponseCurve, ThrusterBuilder};
    use approx::assert_abs_diff_eq;
    use mass_properties::Inertia;
    use nalgebra::Vector3;
    use std::time::Duration;

    fn sim() -> SimulationRef {
        let thruster =
            ThrusterBuilder::new(Vector3::x(), Vector3::zeros(), ResponseCurve::linear(1.0))
                .model()
                .unwrap();
        let inertia = Inertia::new(1.0, 1.0, 1.0, 0.0, 0.0, 0.0).unwrap();
        Simulation::new(1.0, inertia, vec![thruster]).unwrap().shared()
    }

    #[test]
    fn test_fixed_step() {
        let sim = sim();
        let mut subtask = Simulate::new(sim.clone()).with_step(StepSource::Fixed(0.05));
        for _ in 0..4 {
            let wrench = subtask.produce(&SensorSnapshot::new(0.0)).unwrap();
            assert!(wrench.is_zero());
        }
        assert_abs_diff_eq!(sim.borrow().time(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_wall_clock_first_tick_latches() {
        let sim = sim();
        let mut subtask = Simulate::new(sim.clone());
        subtask.produce(&SensorSnapshot::new(0.0)).unwrap();
        assert_eq!(sim.borrow().time(), 0.0);
        std::thread::sleep(Duration::from_millis(5));
        subtask.produce(&SensorSnapshot::new(0.0)).unwrap();
        assert!(sim.borrow().time() >= 0.005);
    }

    #[test]
    fn test_bad_step_fails_the_tick() {
        let mut subtask = Simulate::new(sim()).with_step(StepSource::Fixed(-1.0));
        assert!(subtask.produce(&SensorSnapshot::new(0.0)).is_err());
    }
}
