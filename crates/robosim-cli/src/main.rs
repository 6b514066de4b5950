//! robosim CLI - headless scenario runner
//!
//! Loads a scenario JSON, drives its motors with constant commands and
//! reports where everything ended up.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use robosim_physics::{
    Actuators, Controller, ControllerError, LoadOptions, MotorParams, Scenario, SensorKind,
    SensorReadings, Simulation,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "robosim")]
#[command(about = "Headless 2D robot simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Step a scenario and print the final state
    Run {
        /// Scenario JSON file
        scenario: PathBuf,
        /// Number of ticks to run
        #[arg(short, long, default_value_t = 120)]
        steps: u64,
        /// Tick length in seconds (default: the scenario timestep)
        #[arg(long)]
        dt: Option<f64>,
        /// Constant motor command, as `motor=value` (repeatable)
        #[arg(short, long = "command", value_parser = parse_command)]
        commands: Vec<(String, f64)>,
        /// Write the per-tick trace to this JSON file
        #[arg(long)]
        trace: Option<PathBuf>,
        /// Keep the scenario gravity instead of the top-down view
        #[arg(long)]
        side_view: bool,
        /// Skip terrain bodies
        #[arg(long)]
        ignore_terrain: bool,
    },
    /// Display the bodies, joints and devices of a scenario
    Info {
        /// Scenario JSON file
        scenario: PathBuf,
    },
}

/// Applies the same command to each listed motor every tick.
struct ConstantCommands(BTreeMap<String, f64>);

impl Controller for ConstantCommands {
    fn update(
        &mut self,
        _readings: &SensorReadings,
        actuators: &mut Actuators<'_>,
        _dt: f64,
    ) -> Result<(), ControllerError> {
        for (name, value) in &self.0 {
            if !actuators.command(name, *value) {
                return Err(format!("no motor named '{name}'").into());
            }
        }
        Ok(())
    }
}

fn parse_command(arg: &str) -> Result<(String, f64), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected motor=value, got '{arg}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid command value '{value}': {e}"))?;
    Ok((name.trim().to_string(), value))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            steps,
            dt,
            commands,
            trace,
            side_view,
            ignore_terrain,
        } => {
            let options = LoadOptions {
                top_down: !side_view,
                ignore_terrain,
            };
            run(&scenario, options, steps, dt, commands, trace.as_deref())?;
        }
        Commands::Info { scenario } => {
            show_info(&scenario)?;
        }
    }

    Ok(())
}

fn read_scenario(path: &Path) -> Result<Scenario> {
    let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing scenario {}", path.display()))
}

fn run(
    path: &Path,
    options: LoadOptions,
    steps: u64,
    dt: Option<f64>,
    commands: Vec<(String, f64)>,
    trace: Option<&Path>,
) -> Result<()> {
    if let Some(dt) = dt {
        anyhow::ensure!(dt.is_finite() && dt > 0.0, "--dt must be positive, got {dt}");
    }
    let scenario = read_scenario(path)?;
    let mut sim = Simulation::load(scenario, options)
        .with_context(|| format!("loading scenario {}", path.display()))?;

    sim.set_controller(ConstantCommands(commands.into_iter().collect()));
    sim.enable_trace_logging(trace.is_some(), None);

    tracing::info!(steps, dt = dt.unwrap_or(sim.timestep()), "Running {}", path.display());
    let mut warnings = 0usize;
    for _ in 0..steps {
        sim.step(dt);
        if sim.last_physics_warning().is_some() {
            warnings += 1;
        }
    }

    println!("robosim run: {}", path.display());
    println!("  Steps: {}", sim.step_index());
    println!("  Time: {:.4} s", sim.time());
    println!("  Ticks with warnings: {}", warnings);

    println!("\nBodies:");
    for body in sim.bodies().iter().filter(|b| b.can_move) {
        let v = body.state.linear_velocity;
        println!(
            "  {}: x={:.4} y={:.4} theta={:.4} v=({:.4}, {:.4}) omega={:.4}",
            body.name,
            body.pose.x,
            body.pose.y,
            body.pose.theta,
            v.x,
            v.y,
            body.state.angular_velocity
        );
    }

    if !sim.last_sensor_readings().is_empty() {
        println!("\nSensors:");
        for (name, reading) in sim.last_sensor_readings() {
            println!("  {}: {}", name, serde_json::to_string(reading)?);
        }
    }

    if let Some(warning) = sim.last_physics_warning() {
        println!("\nLast physics warning: {}", warning);
    }
    if let Some(error) = sim.last_controller_error() {
        println!("\nController error: {}", error);
    }

    if let Some(out) = trace {
        sim.save_trace_log(out)
            .with_context(|| format!("writing trace to {}", out.display()))?;
        println!("\nWrote {} trace records to {}", sim.export_trace_log().len(), out.display());
    }

    Ok(())
}

fn show_info(path: &Path) -> Result<()> {
    let scenario = read_scenario(path)?;
    let Scenario { world, robot } = &scenario;

    println!("robosim scenario: {}", path.display());
    println!("  World: {}", world.name);
    println!("  Timestep: {} s", world.timestep);
    println!("  Gravity: ({}, {})", world.gravity[0], world.gravity[1]);
    println!("  Terrain bodies: {}", world.terrain.len());
    println!("  Wall strokes: {}", world.walls.len());
    if let Some(b) = &world.bounds {
        println!("  Bounds: [{}, {}] x [{}, {}]", b.min_x, b.max_x, b.min_y, b.max_y);
    }

    let spawn = robot.spawn_pose;
    println!("\nRobot (spawn x={} y={} theta={}):", spawn.x, spawn.y, spawn.theta);
    for body in &robot.bodies {
        let kind = if body.can_move { "dynamic" } else { "static" };
        println!("  body {}: {} mass={}", body.name, kind, body.mass);
    }
    for joint in &robot.joints {
        println!(
            "  joint {}: {:?} {} -> {} (compliance {})",
            joint.name, joint.kind, joint.parent, joint.child, joint.compliance
        );
    }
    for actuator in &robot.actuators {
        let model = match &actuator.params {
            MotorParams::Wheel(p) => format!("wheel max_force={}", p.max_force),
            MotorParams::Detailed { preset } => format!("detailed preset={}", preset),
        };
        println!("  motor {} on {}: {}", actuator.name, actuator.body, model);
    }
    for sensor in &robot.sensors {
        let kind = match &sensor.kind {
            SensorKind::Distance { max_range } => format!("distance max_range={}", max_range),
            SensorKind::Line => "line".to_string(),
            SensorKind::Imu => "imu".to_string(),
            SensorKind::Encoder => "encoder".to_string(),
        };
        println!("  sensor {} on {}: {}", sensor.name, sensor.body, kind);
    }

    // Also verify the scenario assembles
    match Simulation::load(scenario.clone(), LoadOptions::default()) {
        Ok(sim) => println!("\nAssembled {} bodies", sim.bodies().len()),
        Err(e) => println!("\nFailed to load: {}", e),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("left=0.5").unwrap(), ("left".to_string(), 0.5));
        assert_eq!(parse_command(" right = -1 ").unwrap(), ("right".to_string(), -1.0));
        assert!(parse_command("left").is_err());
        assert!(parse_command("left=fast").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "robosim", "run", "arena.json", "--steps", "10", "-c", "left=1", "--command", "right=0.5",
        ])
        .unwrap();
        let Commands::Run { steps, commands, trace, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(steps, 10);
        assert_eq!(commands.len(), 2);
        assert!(trace.is_none());
    }
}
