use crate::{AuvErrors, ConfigErrors, VehicleConfig, vehicle::Auv};
use hardware::{ActuatorSink, SensorInterface, SensorSource, SystemClock};
use relay::{RemoteImu, RemoteThruster, SimulationClient, UpdateSimClient};
use simulation::{
    FakeClock, FakeDepth, FakeImu, Simulate, SimulatedThruster, Simulation, SimulationRef,
    StepSource,
};
use std::{net::ToSocketAddrs, path::Path};

/// Rigid body matching the vehicle description, optionally recording every
/// step under `recording`.
pub fn build_simulation(
    config: &VehicleConfig,
    recording: Option<&Path>,
) -> Result<Simulation, AuvErrors> {
    let props = config.mass_properties.resolve().map_err(ConfigErrors::from)?;
    let mut sim = Simulation::new(props.mass, props.inertia, config.models()?)?
        .with_center_of_mass(props.center_of_mass);
    if let Some(path) = recording {
        sim = sim.with_recording(path)?;
    }
    Ok(sim)
}

/// A vehicle wired to an in-process simulation: thrusters write into the
/// simulation, sensors and clock read from it, and a [`Simulate`] subtask
/// advances it once per tick.
pub fn simulated_vehicle(
    config: &VehicleConfig,
    step: StepSource,
    recording: Option<&Path>,
) -> Result<(Auv, SimulationRef), AuvErrors> {
    config.settings.validate()?;
    let sim = build_simulation(config, recording)?.shared();

    let sinks = (0..config.thrusters.len())
        .map(|i| Box::new(SimulatedThruster::new(sim.clone(), i)) as Box<dyn ActuatorSink>)
        .collect();
    let allocator = config.allocator(sinks)?;

    let mut imu = FakeImu::new(sim.clone());
    if let Some(noise) = config.imu_noise {
        imu = imu.with_noise(noise)?;
    }
    let sources: Vec<Box<dyn SensorSource>> =
        vec![Box::new(imu), Box::new(FakeDepth::new(sim.clone()))];

    let mut auv = Auv::new(
        allocator,
        SensorInterface::new(sources),
        Box::new(FakeClock::new(sim.clone())),
    )
    .with_settings(config.settings);
    auv.register_subtask(Simulate::new(sim.clone()).with_step(step));
    Ok((auv, sim))
}

/// A vehicle driving a simulation served by another process.
pub fn remote_vehicle(config: &VehicleConfig, addr: impl ToSocketAddrs) -> Result<Auv, AuvErrors> {
    config.settings.validate()?;
    let client = SimulationClient::connect(addr, config.settings.io_timeout())?.shared();

    let sinks = (0..config.thrusters.len())
        .map(|i| Box::new(RemoteThruster::new(client.clone(), i)) as Box<dyn ActuatorSink>)
        .collect();
    let allocator = config.allocator(sinks)?;
    let sources: Vec<Box<dyn SensorSource>> = vec![Box::new(RemoteImu::new(client.clone()))];

    let mut auv = Auv::new(
        allocator,
        SensorInterface::new(sources),
        Box::new(SystemClock::new()),
    )
    .with_settings(config.settings);
    auv.register_subtask(UpdateSimClient::new(client));
    Ok(auv)
}
