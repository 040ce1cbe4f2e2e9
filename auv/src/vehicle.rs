use crate::{AuvErrors, ConfigErrors};
use allocation::Allocator;
use hardware::{Clock, SensorInterface, SensorSnapshot};
use mission::{MissionState, Path, Sequencer, Subtask, WrenchTotal};
use rotations::prelude::UnitQuaternion;
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// What the thrusters do once every task has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishPolicy {
    /// Send zero to every thruster.
    #[default]
    Zero,
    /// Leave the last commands running.
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSettings {
    /// Resolve world-frame demands with the heading only, ignoring roll and
    /// pitch.
    pub lock_to_yaw: bool,
    /// Seconds a sensor read may take before the mission is abandoned.
    pub io_timeout: f64,
    /// Minimum seconds between ticks, zero runs the loop flat out.
    pub tick_period: f64,
    pub finish: FinishPolicy,
}

impl Default for VehicleSettings {
    fn default() -> Self {
        Self {
            lock_to_yaw: false,
            io_timeout: 0.1,
            tick_period: 0.0,
            finish: FinishPolicy::Zero,
        }
    }
}

impl VehicleSettings {
    pub fn validate(&self) -> Result<(), ConfigErrors> {
        if !self.io_timeout.is_finite() || self.io_timeout <= 0.0 {
            return Err(ConfigErrors::InvalidTimeout(self.io_timeout));
        }
        Ok(())
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.io_timeout).unwrap_or(Duration::ZERO)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::try_from_secs_f64(self.tick_period).unwrap_or(Duration::ZERO)
    }
}

/// Cross-thread request to stop the running mission.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears a previous stop so the handle can guard another mission.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MissionOutcome {
    Finished,
    Aborted(String),
    Stopped,
}

/// The vehicle: sensors in, thruster commands out, a mission in between.
pub struct Auv {
    allocator: Allocator,
    sensors: SensorInterface,
    clock: Box<dyn Clock>,
    subtasks: Vec<Box<dyn Subtask>>,
    settings: VehicleSettings,
}

impl Auv {
    pub fn new(allocator: Allocator, sensors: SensorInterface, clock: Box<dyn Clock>) -> Self {
        let settings = VehicleSettings::default();
        Self {
            allocator,
            sensors: sensors.with_timeout(settings.io_timeout()),
            clock,
            subtasks: Vec::new(),
            settings,
        }
    }

    pub fn with_settings(mut self, settings: VehicleSettings) -> Self {
        self.sensors = self.sensors.with_timeout(settings.io_timeout());
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &VehicleSettings {
        &self.settings
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// For hot-swapping thruster sinks between missions.
    pub fn allocator_mut(&mut self) -> &mut Allocator {
        &mut self.allocator
    }

    /// Adds a behavior that runs on every tick of every mission.
    pub fn register_subtask(&mut self, subtask: impl Subtask + 'static) {
        self.subtasks.push(Box::new(subtask));
    }

    pub fn register_boxed_subtask(&mut self, subtask: Box<dyn Subtask>) {
        self.subtasks.push(subtask);
    }

    pub fn subtask_count(&self) -> usize {
        self.subtasks.len()
    }

    /// Sends zero to every thruster.
    pub fn kill(&mut self) -> Result<(), AuvErrors> {
        Ok(self.allocator.kill()?)
    }

    /// Runs `path` to the end. The thrusters are left at zero unless the
    /// mission finishes under [`FinishPolicy::Hold`]. Device failures kill
    /// the thrusters and come back as errors; behavior failures come back as
    /// [`MissionOutcome::Aborted`].
    pub fn travel_path(
        &mut self,
        path: Path,
        stop: &StopHandle,
    ) -> Result<MissionOutcome, AuvErrors> {
        log::info!("starting mission with {} tasks", path.len());
        let subtasks = std::mem::take(&mut self.subtasks);
        let mut sequencer = Sequencer::new(path, subtasks);
        let result = self.run(&mut sequencer, stop);
        self.subtasks = sequencer.into_subtasks();

        match result {
            Ok(outcome) => {
                if outcome != MissionOutcome::Finished || self.settings.finish == FinishPolicy::Zero
                {
                    self.kill()?;
                }
                log::info!("mission ended: {outcome:?}");
                Ok(outcome)
            }
            Err(e) => {
                log::error!("mission failed: {e}");
                if let Err(kill) = self.allocator.kill() {
                    log::error!("could not stop thrusters after failure: {kill}");
                }
                Err(e)
            }
        }
    }

    fn run(
        &mut self,
        sequencer: &mut Sequencer,
        stop: &StopHandle,
    ) -> Result<MissionOutcome, AuvErrors> {
        let period = self.settings.tick_period();
        loop {
            if stop.is_stopped() {
                sequencer.abort("stop requested");
                return Ok(MissionOutcome::Stopped);
            }
            let tick_start = Instant::now();

            let snapshot = match self.sensors.snapshot(self.clock.now()) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    sequencer.abort(format!("sensor read failed: {e}"));
                    return Err(e.into());
                }
            };

            let Some(total) = sequencer.tick(&snapshot) else {
                break;
            };
            let Some(attitude) = self.resolving_attitude(&total, &snapshot) else {
                sequencer.abort("world-frame demand without an imu reading");
                break;
            };
            let demand = total.resolve(&attitude);
            if let Err(e) = self.allocator.command(&demand) {
                sequencer.abort(format!("allocation failed: {e}"));
                return Err(e.into());
            }

            if let Some(rest) = period.checked_sub(tick_start.elapsed()) {
                std::thread::sleep(rest);
            }
        }

        Ok(match sequencer.state() {
            MissionState::Aborted(reason) => MissionOutcome::Aborted(reason.clone()),
            _ => MissionOutcome::Finished,
        })
    }

    /// Attitude used to bring world-frame demands into the body frame.
    fn resolving_attitude(
        &self,
        total: &WrenchTotal,
        snapshot: &SensorSnapshot,
    ) -> Option<UnitQuaternion> {
        match snapshot.imu {
            Some(imu) if self.settings.lock_to_yaw => Some(imu.attitude.yaw_only()),
            Some(imu) => Some(imu.attitude),
            None if total.world.is_zero() => Some(UnitQuaternion::IDENTITY),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocation::{ResponseCurve, ThrusterBuilder, Wrench};
    use approx::assert_abs_diff_eq;
    use hardware::{
        ActuatorSink, HardwareErrors, ImuReading, Measurement, RecordingSink, SensorSource,
    };
    use mass_properties::Inertia;
    use mission::{AccelerateVector, BehaviorResult, Task};
    use nalgebra::Vector3;
    use std::{cell::Cell, rc::Rc};

    /// Ticks the clock forward by 0.1 s per read.
    struct StepClock(Rc<Cell<f64>>);

    impl Clock for StepClock {
        fn now(&self) -> f64 {
            let t = self.0.get();
            self.0.set(t + 0.1);
            t
        }
    }

    struct FixedImu(f64);

    impl SensorSource for FixedImu {
        fn name(&self) -> &str {
            "fixed imu"
        }

        fn read(&mut self, _timeout: Duration) -> Result<Measurement, HardwareErrors> {
            Ok(Measurement::Imu(ImuReading::new(
                UnitQuaternion::from_yaw(self.0),
                Vector3::zeros(),
            )))
        }
    }

    struct Unplugged;

    impl SensorSource for Unplugged {
        fn name(&self) -> &str {
            "unplugged"
        }

        fn read(&mut self, timeout: Duration) -> Result<Measurement, HardwareErrors> {
            Err(HardwareErrors::Timeout(self.name().to_string(), timeout))
        }
    }

    struct Failing;

    impl Task for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn is_finished(&self) -> bool {
            false
        }

        fn produce(&mut self, _sensors: &SensorSnapshot) -> BehaviorResult {
            Err("broken".into())
        }
    }

    /// Pure surge/sway vehicle, two thrusters along x and two along y.
    fn vehicle(sensors: Vec<Box<dyn SensorSource>>) -> (Auv, Vec<RecordingSink>) {
        let sinks: Vec<RecordingSink> = (0..4).map(|_| RecordingSink::new()).collect();
        let layout = [
            ([1.0, 0.0, 0.0], [0.0, 0.5, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, -0.5, 0.0]),
            ([0.0, 1.0, 0.0], [0.5, 0.0, 0.0]),
            ([0.0, 1.0, 0.0], [-0.5, 0.0, 0.0]),
        ];
        let thrusters = layout
            .iter()
            .zip(&sinks)
            .map(|((d, p), sink)| {
                ThrusterBuilder::new(Vector3::from(*d), Vector3::from(*p), ResponseCurve::linear(1.0))
                    .build(Box::new(sink.clone()) as Box<dyn ActuatorSink>)
                    .unwrap()
            })
            .collect();
        let inertia = Inertia::new(1.0, 1.0, 1.0, 0.0, 0.0, 0.0).unwrap();
        let allocator = Allocator::new(1.0, inertia, thrusters).unwrap();
        let clock = StepClock(Rc::new(Cell::new(0.0)));
        let auv = Auv::new(allocator, SensorInterface::new(sensors), Box::new(clock));
        (auv, sinks)
    }

    #[test]
    fn test_world_demand_resolved_with_attitude() {
        let (mut auv, sinks) = vehicle(vec![Box::new(FixedImu(std::f64::consts::FRAC_PI_2))]);
        auv.settings.finish = FinishPolicy::Hold;
        // world +x while facing +y is body -y
        let path = Path::new()
            .with_task(AccelerateVector::new(Wrench::world().with_tx(0.4), 0.0).unwrap());
        let outcome = auv.travel_path(path, &StopHandle::new()).unwrap();
        assert_eq!(outcome, MissionOutcome::Finished);
        assert_abs_diff_eq!(sinks[0].last().unwrap(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(sinks[2].last().unwrap(), -0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(sinks[3].last().unwrap(), -0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_finish_zeroes_thrusters() {
        let (mut auv, sinks) = vehicle(vec![Box::new(FixedImu(0.0))]);
        let path =
            Path::new().with_task(AccelerateVector::new(Wrench::body().with_tx(0.4), 0.25).unwrap());
        let outcome = auv.travel_path(path, &StopHandle::new()).unwrap();
        assert_eq!(outcome, MissionOutcome::Finished);
        // three ticks at t = 0, 0.1, 0.2 then one more at 0.3 finishes
        let history = sinks[0].history();
        assert_eq!(history.len(), 5);
        assert_abs_diff_eq!(history[0], 0.2, epsilon = 1e-6);
        assert_eq!(history[4], 0.0);
    }

    #[test]
    fn test_stop_before_start() {
        let (mut auv, sinks) = vehicle(vec![Box::new(FixedImu(0.0))]);
        let stop = StopHandle::new();
        stop.stop();
        let path = Path::new().with_task(Failing);
        assert_eq!(auv.travel_path(path, &stop).unwrap(), MissionOutcome::Stopped);
        for sink in &sinks {
            assert_eq!(sink.history(), vec![0.0]);
        }
    }

    #[test]
    fn test_task_failure_aborts() {
        let (mut auv, sinks) = vehicle(vec![Box::new(FixedImu(0.0))]);
        let outcome = auv
            .travel_path(Path::new().with_task(Failing), &StopHandle::new())
            .unwrap();
        assert!(matches!(outcome, MissionOutcome::Aborted(reason) if reason.contains("broken")));
        assert_eq!(sinks[1].history(), vec![0.0]);
    }

    #[test]
    fn test_sensor_timeout_is_an_error() {
        let (mut auv, sinks) = vehicle(vec![Box::new(Unplugged)]);
        let path =
            Path::new().with_task(AccelerateVector::new(Wrench::body().with_tx(0.4), 1.0).unwrap());
        let err = auv.travel_path(path, &StopHandle::new()).unwrap_err();
        assert!(matches!(err, AuvErrors::Hardware(e) if e.is_timeout()));
        assert_eq!(sinks[0].history(), vec![0.0]);
    }

    #[test]
    fn test_world_demand_needs_imu() {
        let (mut auv, sinks) = vehicle(Vec::new());
        let path =
            Path::new().with_task(AccelerateVector::new(Wrench::world().with_tx(0.4), 1.0).unwrap());
        let outcome = auv.travel_path(path, &StopHandle::new()).unwrap();
        assert!(matches!(outcome, MissionOutcome::Aborted(_)));
        assert_eq!(sinks[0].history(), vec![0.0]);
    }

    #[test]
    fn test_subtasks_survive_missions() {
        struct Idle;
        impl Subtask for Idle {
            fn name(&self) -> &str {
                "idle"
            }
            fn produce(&mut self, _sensors: &SensorSnapshot) -> BehaviorResult {
                Ok(Wrench::body())
            }
        }
        let (mut auv, _) = vehicle(vec![Box::new(FixedImu(0.0))]);
        auv.register_subtask(Idle);
        auv.travel_path(Path::new(), &StopHandle::new()).unwrap();
        assert_eq!(auv.subtask_count(), 1);
    }
}
