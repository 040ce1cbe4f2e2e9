use crate::vehicle::VehicleSettings;
use allocation::{
    AllocationErrors, Allocator, Thruster, ThrusterBuilder, ThrusterErrors, ThrusterModel, Wrench,
};
use hardware::ActuatorSink;
use mass_properties::{
    CenterOfMass, Inertia, InertiaBuilder, MassProperties, MassPropertiesErrors,
};
use mission::{AccelerateVector, HeadingPid, MissionErrors, Path, PidGains, Subtask, Wait};
use ron::ser::{PrettyConfig, to_string_pretty};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use simulation::ImuNoise;
use std::{fs, path::Path as FilePath};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigErrors {
    #[error("{0}")]
    Allocation(#[from] AllocationErrors),
    #[error("io timeout {0} must be finite and positive")]
    InvalidTimeout(f64),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    MassProperties(#[from] MassPropertiesErrors),
    #[error("{0}")]
    Mission(#[from] MissionErrors),
    #[error("could not parse ron: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("could not write ron: {0}")]
    Serialize(#[from] ron::Error),
    #[error("{0} thrusters configured but {1} sinks given")]
    SinkCount(usize, usize),
    #[error("thruster {0}: {1}")]
    Thruster(usize, #[source] ThrusterErrors),
}

fn read_ron<T: DeserializeOwned>(path: &FilePath) -> Result<T, ConfigErrors> {
    let text = fs::read_to_string(path)?;
    Ok(ron::from_str(&text)?)
}

fn write_ron<T: Serialize>(value: &T, path: &FilePath) -> Result<(), ConfigErrors> {
    let text = to_string_pretty(value, PrettyConfig::new())?;
    fs::write(path, text)?;
    Ok(())
}

/// Mass properties given directly or built from shapes. Thruster positions
/// share the frame the center of mass is given in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MassSource {
    Explicit {
        mass: f64,
        inertia: Inertia,
        #[serde(default)]
        center_of_mass: CenterOfMass,
    },
    Shapes(InertiaBuilder),
}

impl MassSource {
    pub fn resolve(&self) -> Result<MassProperties, MassPropertiesErrors> {
        match self {
            MassSource::Explicit {
                mass,
                inertia,
                center_of_mass,
            } => MassProperties::new(*mass, *center_of_mass, *inertia),
            MassSource::Shapes(builder) => builder.build(),
        }
    }
}

fn default_regularization() -> f64 {
    Allocator::DEFAULT_REGULARIZATION
}

/// Everything needed to put a vehicle together: hull, thrusters and loop
/// settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    pub name: String,
    pub mass_properties: MassSource,
    pub thrusters: Vec<ThrusterBuilder>,
    /// Wrench error weights `[fx, fy, fz, tx, ty, tz]`, all ones when absent.
    #[serde(default)]
    pub weights: Option<[f64; 6]>,
    #[serde(default = "default_regularization")]
    pub regularization: f64,
    #[serde(default)]
    pub settings: VehicleSettings,
    /// Noise on the simulated imu, simulation only.
    #[serde(default)]
    pub imu_noise: Option<ImuNoise>,
}

impl VehicleConfig {
    pub fn load(path: &FilePath) -> Result<Self, ConfigErrors> {
        let config: Self = read_ron(path)?;
        config.settings.validate()?;
        log::info!("loaded vehicle '{}' from {}", config.name, path.display());
        Ok(config)
    }

    pub fn save(&self, path: &FilePath) -> Result<(), ConfigErrors> {
        write_ron(self, path)
    }

    pub fn models(&self) -> Result<Vec<ThrusterModel>, ConfigErrors> {
        self.thrusters
            .iter()
            .enumerate()
            .map(|(i, t)| t.model().map_err(|e| ConfigErrors::Thruster(i, e)))
            .collect()
    }

    /// Builds the allocator, thruster `i` sending to `sinks[i]`.
    pub fn allocator(&self, sinks: Vec<Box<dyn ActuatorSink>>) -> Result<Allocator, ConfigErrors> {
        if sinks.len() != self.thrusters.len() {
            return Err(ConfigErrors::SinkCount(self.thrusters.len(), sinks.len()));
        }
        let thrusters = self
            .thrusters
            .iter()
            .zip(sinks)
            .enumerate()
            .map(|(i, (t, sink))| t.build(sink).map_err(|e| ConfigErrors::Thruster(i, e)))
            .collect::<Result<Vec<Thruster>, ConfigErrors>>()?;
        let props = self.mass_properties.resolve()?;
        let mut allocator = Allocator::new(props.mass, props.inertia, thrusters)?
            .with_center_of_mass(props.center_of_mass)
            .with_regularization(self.regularization)?;
        if let Some(weights) = self.weights {
            allocator = allocator.with_weights(weights)?;
        }
        Ok(allocator)
    }
}

/// A mission step as written in a mission file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskConfig {
    AccelerateVector { demand: Wrench, duration: f64 },
    Wait { duration: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingHold {
    pub target: f64,
    pub gains: PidGains,
    #[serde(default)]
    pub limit: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionConfig {
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub heading_hold: Option<HeadingHold>,
}

impl MissionConfig {
    pub fn load(path: &FilePath) -> Result<Self, ConfigErrors> {
        read_ron(path)
    }

    pub fn save(&self, path: &FilePath) -> Result<(), ConfigErrors> {
        write_ron(self, path)
    }

    pub fn path(&self) -> Result<Path, ConfigErrors> {
        let mut path = Path::new();
        for task in &self.tasks {
            path = match task {
                TaskConfig::AccelerateVector { demand, duration } => {
                    path.with_task(AccelerateVector::new(*demand, *duration)?)
                }
                TaskConfig::Wait { duration } => path.with_task(Wait::new(*duration)?),
            };
        }
        Ok(path)
    }

    /// Subtasks the mission asks for on top of the vehicle's own.
    pub fn subtasks(&self) -> Vec<Box<dyn Subtask>> {
        let mut subtasks: Vec<Box<dyn Subtask>> = Vec::new();
        if let Some(hold) = self.heading_hold {
            let mut pid = HeadingPid::new(hold.target, hold.gains);
            if let Some(limit) = hold.limit {
                pid = pid.with_limit(limit);
            }
            subtasks.push(Box::new(pid));
        }
        subtasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocation::{Frame, ResponseCurve};
    use hardware::RecordingSink;
    use mass_properties::Cuboid;
    use nalgebra::Vector3;

    fn vehicle() -> VehicleConfig {
        let builder = |d: [f64; 3], p: [f64; 3]| {
            ThrusterBuilder::new(Vector3::from(d), Vector3::from(p), ResponseCurve::linear(1.0))
                .with_bounds(-0.5, 0.5)
                .with_deadzone(-0.1, 0.1)
        };
        VehicleConfig {
            name: "test".to_string(),
            mass_properties: MassSource::Shapes(
                InertiaBuilder::new().with_shape(Cuboid::new(1.0, 1.0, 1.0, 0.1)),
            ),
            thrusters: vec![
                builder([1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]),
                builder([1.0, -1.0, 0.0], [-1.0, -1.0, 0.0]),
                builder([1.0, -1.0, 0.0], [1.0, 1.0, 0.0]),
                builder([1.0, 1.0, 0.0], [1.0, -1.0, 0.0]),
            ],
            weights: None,
            regularization: default_regularization(),
            settings: VehicleSettings::default(),
            imu_noise: Some(ImuNoise {
                acceleration_deviation: 0.05,
                attitude_deviation: 0.0,
                seed: 3,
            }),
        }
    }

    #[test]
    fn test_vehicle_ron_round_trip() {
        let config = vehicle();
        let text = to_string_pretty(&config, PrettyConfig::new()).unwrap();
        let back: VehicleConfig = ron::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_mission_from_ron() {
        let text = r#"(
            tasks: [
                AccelerateVector(demand: (tx: 1.0, frame: World), duration: 3.0),
                Wait(duration: 0.5),
            ],
            heading_hold: Some((target: 0.0, gains: (kp: 1.0, ki: 0.0, kd: 0.2))),
        )"#;
        let mission: MissionConfig = ron::from_str(text).unwrap();
        assert_eq!(
            mission.tasks[0],
            TaskConfig::AccelerateVector {
                demand: Wrench::world().with_tx(1.0),
                duration: 3.0
            }
        );
        assert_eq!(mission.path().unwrap().len(), 2);
        assert_eq!(mission.subtasks().len(), 1);
        if let TaskConfig::AccelerateVector { demand, .. } = mission.tasks[0] {
            assert_eq!(demand.frame, Frame::World);
        }
    }

    #[test]
    fn test_bad_mission_rejected() {
        let mission = MissionConfig {
            tasks: vec![TaskConfig::Wait { duration: -1.0 }],
            heading_hold: None,
        };
        assert!(matches!(
            mission.path(),
            Err(ConfigErrors::Mission(MissionErrors::InvalidDuration(_)))
        ));
    }

    #[test]
    fn test_allocator_from_config() {
        let config = vehicle();
        let sinks: Vec<Box<dyn ActuatorSink>> =
            (0..4).map(|_| Box::new(RecordingSink::new()) as Box<dyn ActuatorSink>).collect();
        let allocator = config.allocator(sinks).unwrap();
        assert_eq!(allocator.thrusters().len(), 4);
        assert_eq!(allocator.mass(), 1.0);

        let too_few: Vec<Box<dyn ActuatorSink>> = vec![Box::new(RecordingSink::new())];
        assert!(matches!(config.allocator(too_few), Err(ConfigErrors::SinkCount(4, 1))));

        let mut bad = vehicle();
        bad.thrusters[2] = bad.thrusters[2].clone().with_deadzone(0.1, 0.2);
        assert!(matches!(bad.models(), Err(ConfigErrors::Thruster(2, _))));
    }

    #[test]
    fn test_allocator_uses_shape_center_of_mass() {
        let mut config = vehicle();
        config.mass_properties = MassSource::Shapes(
            InertiaBuilder::new()
                .with_shape(Cuboid::new(1.0, 1.0, 1.0, 0.1))
                .with_shape(
                    Cuboid::new(3.0, 0.2, 0.2, 0.2).with_center(Vector3::new(0.0, 1.0, 0.0)),
                ),
        );
        let sinks: Vec<Box<dyn ActuatorSink>> =
            (0..4).map(|_| Box::new(RecordingSink::new()) as Box<dyn ActuatorSink>).collect();
        let allocator = config.allocator(sinks).unwrap();
        assert_eq!(allocator.center_of_mass(), CenterOfMass::new(0.0, 0.75, 0.0));

        let allocation = allocator.allocate(&Wrench::body().with_tx(0.15)).unwrap();
        assert!((allocation.force()[0] - 0.6).abs() < 1e-6);
        assert!(allocation.torque().norm() < 1e-6);
        assert!(allocation.commands.iter().all(|c| *c >= 0.1));

        let explicit = MassSource::Explicit {
            mass: 2.0,
            inertia: Inertia::new(1.0, 1.0, 1.0, 0.0, 0.0, 0.0).unwrap(),
            center_of_mass: CenterOfMass::new(f64::NAN, 0.0, 0.0),
        };
        assert!(matches!(
            explicit.resolve(),
            Err(MassPropertiesErrors::NonFinite)
        ));
    }
}
