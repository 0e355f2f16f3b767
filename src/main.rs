//! ventd: control loop daemon.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  TCP clients ──▶ RpcServer ──▶ CoordinatorLocal              │
//! │                                    │                         │
//! │                              ControlModule ("vent-loop")     │
//! │                                    │                         │
//! │        Hal ── PlantLinked<OnOffValve>      (inlet)           │
//! │            ── PlantLinked<PwmControlValve> (proportional)    │
//! │            ── SimPlant                     (sensors)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The valve drivers run their full actuator path against in-memory
//! lines; the simulated plant follows whatever opening they report.

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use ventcore::adapters::calibration::JsonCalibrationFile;
use ventcore::adapters::hal::Hal;
use ventcore::adapters::log_sink::LogEventSink;
use ventcore::adapters::sim::SimActuator;
use ventcore::adapters::time::SystemClock;
use ventcore::app::ports::Clock;
use ventcore::config::VentConfig;
use ventcore::control::module::ControlModule;
use ventcore::coordinator::{Coordinator, CoordinatorLocal};
use ventcore::drivers::control_valve::{OnOffValve, PwmControlValve};
use ventcore::drivers::response::{CalibrationSource, ResponseCurve};
use ventcore::drivers::valve::PlantLinked;
use ventcore::message::ValueName;
use ventcore::rpc::serve_tcp;
use ventcore::sensors::sim::{PlantParams, SimPlant};

#[derive(Debug, Parser)]
#[command(name = "ventd", version, about = "Ventilator control loop daemon")]
struct Args {
    /// JSON configuration file (defaults are used if it does not exist).
    #[arg(long, default_value = "ventd.json")]
    config: PathBuf,

    /// Proportional valve calibration table (`[[duty, rising, falling], ...]`).
    /// A linear response is assumed when omitted.
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Address the RPC server listens on.
    #[arg(long, default_value = "127.0.0.1:7700")]
    listen: String,

    /// Start the control loop immediately instead of waiting for a client.
    #[arg(long)]
    autostart: bool,

    /// Zero-offset calibrate the pressure sensor before serving.
    #[arg(long)]
    zero_pressure: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("ventd v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration ──────────────────────────────────────
    let config = VentConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    // ── 2. Simulated plant + valve drivers ────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let plant = SimPlant::new(Arc::clone(&clock), PlantParams::default());
    let handle = plant.handle();

    let calibration: Box<dyn CalibrationSource> = match &args.calibration {
        Some(path) => Box::new(JsonCalibrationFile::new(path)),
        None => {
            warn!("no calibration table given, assuming a linear valve");
            Box::new(ResponseCurve::linear().rows().to_vec())
        }
    };
    let control = PwmControlValve::new(
        SimActuator::pwm(),
        config.control_valve_form,
        &*calibration,
        Some(config.valve_frequency_hz),
    )
    .context("control valve")?;
    let inlet = OnOffValve::new(SimActuator::digital(), config.inlet_valve_form);

    let hal = Hal::new(
        plant,
        PlantLinked::new(inlet, handle.clone()),
        PlantLinked::new(control, handle),
    );

    // ── 3. Control module + coordinator ───────────────────────
    let module = ControlModule::new(hal, config, clock, Box::new(LogEventSink::new()))
        .context("control module")?;
    if args.zero_pressure {
        let offset = module
            .calibrate(ValueName::Pressure, 50)
            .context("pressure zero calibration")?;
        info!("pressure offset {offset:.3}");
    }
    let coordinator = Arc::new(CoordinatorLocal::new(module));
    if args.autostart {
        coordinator.start().context("starting control loop")?;
    }

    // ── 4. Serve ──────────────────────────────────────────────
    let listener =
        TcpListener::bind(&args.listen).with_context(|| format!("binding {}", args.listen))?;
    serve_tcp(coordinator, listener).context("rpc server")?;
    Ok(())
}
