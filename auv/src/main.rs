use auv::{
    MissionConfig, MissionOutcome, StopHandle, VehicleConfig, build_simulation, remote_vehicle,
    simulated_vehicle,
};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use relay::SimulationServer;
use results::run_path;
use simulation::StepSource;
use std::{error::Error, path::PathBuf, sync::atomic::AtomicBool};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a mission against an in-process simulation
    Simulate {
        #[arg(long, default_value = "auv/configs/anchovy.ron")]
        vehicle: PathBuf,
        #[arg(long, default_value = "auv/configs/demo_mission.ron")]
        mission: PathBuf,
        /// Folder for recorded runs, nothing is recorded when absent
        #[arg(long)]
        results: Option<PathBuf>,
        /// Step the simulation by this many seconds per tick instead of the
        /// wall clock
        #[arg(long)]
        fixed_step: Option<f64>,
    },
    /// Host a simulation for a remote vehicle
    Serve {
        #[arg(long, default_value = "auv/configs/anchovy.ron")]
        vehicle: PathBuf,
        #[arg(long, default_value = "127.0.0.1:7878")]
        bind: String,
        #[arg(long)]
        results: Option<PathBuf>,
    },
    /// Run a mission against a simulation served elsewhere
    Remote {
        #[arg(long, default_value = "auv/configs/anchovy.ron")]
        vehicle: PathBuf,
        #[arg(long, default_value = "auv/configs/demo_mission.ron")]
        mission: PathBuf,
        #[arg(long, default_value = "127.0.0.1:7878")]
        connect: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            vehicle,
            mission,
            results,
            fixed_step,
        } => {
            let config = VehicleConfig::load(&vehicle)?;
            let mission = MissionConfig::load(&mission)?;
            let recording = results.map(|root| run_path(&root, "")).transpose()?;
            let step = fixed_step.map_or(StepSource::wall_clock(), StepSource::Fixed);

            let (mut auv, sim) = simulated_vehicle(&config, step, recording.as_deref())?;
            for subtask in mission.subtasks() {
                auv.register_boxed_subtask(subtask);
            }
            let outcome = auv.travel_path(mission.path()?, &StopHandle::new())?;
            let mut sim = sim.borrow_mut();
            sim.flush_results()?;
            let state = sim.state();
            log::info!(
                "simulated {:.2} s, ended at position {:?} heading {:.3} rad",
                sim.time(),
                state.position.as_slice(),
                state.attitude.yaw()
            );
            report(&outcome);
        }
        Commands::Serve {
            vehicle,
            bind,
            results,
        } => {
            let config = VehicleConfig::load(&vehicle)?;
            let recording = results.map(|root| run_path(&root, "")).transpose()?;
            let mut sim = build_simulation(&config, recording.as_deref())?;
            let server = SimulationServer::bind(bind, config.settings.io_timeout())?;
            let running = AtomicBool::new(true);
            server.serve(&mut sim, &running)?;
        }
        Commands::Remote {
            vehicle,
            mission,
            connect,
        } => {
            let config = VehicleConfig::load(&vehicle)?;
            let mission = MissionConfig::load(&mission)?;
            let mut auv = remote_vehicle(&config, connect)?;
            for subtask in mission.subtasks() {
                auv.register_boxed_subtask(subtask);
            }
            let outcome = auv.travel_path(mission.path()?, &StopHandle::new())?;
            report(&outcome);
        }
    }
    Ok(())
}

fn report(outcome: &MissionOutcome) {
    match outcome {
        MissionOutcome::Finished => log::info!("mission finished"),
        MissionOutcome::Aborted(reason) => log::warn!("mission aborted: {reason}"),
        MissionOutcome::Stopped => log::warn!("mission stopped"),
    }
}
