//! CLI driver for the named acoustic scenario presets.
//!
//! Builds one of the bundled ocean environments, drives `acoustic-engine`
//! directly as a library (no HTTP round-trip), and prints the resulting
//! eigenray collection. The `post` subcommand instead submits the
//! scenario as a `RunRequest` to a running `acoustic-engine` service.

mod scenarios;

use std::sync::Arc;

use acoustic_engine::collection::EigenrayCollection;
use acoustic_engine::listener::EigenrayListener;
use acoustic_engine::eigenray::Eigenray;
use acoustic_engine::wave_queue::WaveQueue;
use acoustic_types::{GeoPoint, RunRequest, TargetSpec};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "ocean-scenarios", about = "Named ocean environments for the acoustic ray-propagation engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the bundled scenario presets.
    List,
    /// Run a scenario locally, in-process, and print the eigenrays found.
    Run {
        /// Scenario name, as printed by `list`.
        name: String,
    },
    /// Render a scenario as a `RunRequest` TOML document, for `POST /runs`.
    Export {
        name: String,
    },
    /// Submit a scenario to a running acoustic-engine service.
    Post {
        name: String,
        #[arg(long, default_value = "http://localhost:3001")]
        endpoint: String,
    },
}

struct PrintingListener;

impl EigenrayListener for PrintingListener {
    fn on_eigenray(&mut self, target_row: usize, target_col: usize, ray: &Eigenray, _run_id: &str) {
        info!(
            "target ({target_row},{target_col}): t={:.5}s source_de={:.3} loss={:.2}dB surf={} bottom={} caustic={}",
            ray.travel_time_s,
            ray.source_de_deg,
            ray.intensity_db.first().copied().unwrap_or(f64::NAN),
            ray.surface,
            ray.bottom,
            ray.caustic,
        );
    }
}

fn run_scenario(name: &str) -> Result<()> {
    let scenario = scenarios::by_name(name).with_context(|| format!("unknown scenario {name}"))?;
    info!("running {} — {}", scenario.name, scenario.description);

    let source = scenario.config.source;
    let targets = scenario.config.targets.clone();
    let frequencies = scenario.config.frequencies_hz.clone();
    let coherent = scenario.coherent;
    let num_steps = scenario.num_steps;

    let mut queue = WaveQueue::new(scenario.ocean, scenario.config)?;
    let collection = Arc::new(std::sync::Mutex::new(EigenrayCollection::new(source, targets, frequencies, coherent)));

    struct Collecting(Arc<std::sync::Mutex<EigenrayCollection>>);
    impl EigenrayListener for Collecting {
        fn on_eigenray(&mut self, row: usize, col: usize, ray: &Eigenray, _run_id: &str) {
            self.0.lock().unwrap().add(row, col, ray.clone());
        }
    }

    queue.notifier.add_listener(Box::new(Collecting(collection.clone())));
    queue.notifier.add_listener(Box::new(PrintingListener));

    for _ in 0..num_steps {
        queue.step(scenario.name)?;
    }
    drop(queue);

    let collection = Arc::try_unwrap(collection).map_err(|_| anyhow::anyhow!("collection still shared"))?.into_inner().unwrap();
    for &(row, col) in collection.keys() {
        let arrivals = collection.arrivals(row, col);
        println!("target ({row},{col}): {} eigenrays", arrivals.len());
        if let Some(total) = collection.total(row, col) {
            println!(
                "  total: t={:.5}s loss={:.2}dB phase={:.3}rad",
                total.travel_time_s,
                total.intensity_db.first().copied().unwrap_or(f64::NAN),
                total.phase_rad.first().copied().unwrap_or(f64::NAN),
            );
        }
    }

    Ok(())
}

fn scenario_to_request(name: &str) -> Result<RunRequest> {
    let scenario = scenarios::by_name(name).with_context(|| format!("unknown scenario {name}"))?;
    let to_point = |p: &acoustic_engine::geo::Position1| GeoPoint {
        latitude_deg: p.latitude(),
        longitude_deg: p.longitude(),
        altitude_m: p.altitude(),
    };
    let bottom_depth_m = -scenario.ocean.bottom.height(&scenario.config.source).0 + acoustic_engine::geo::EARTH_RADIUS;
    Ok(RunRequest {
        source: to_point(&scenario.config.source),
        source_de_deg: scenario.config.source_de_deg.clone(),
        source_az_deg: scenario.config.source_az_deg.clone(),
        frequencies_hz: scenario.config.frequencies_hz.clone(),
        time_step_s: scenario.config.time_step_s,
        num_steps: scenario.num_steps,
        targets: scenario
            .config
            .targets
            .iter()
            .enumerate()
            .map(|(i, t)| TargetSpec { row: i, col: 0, position: to_point(t) })
            .collect(),
        ocean_profile: scenario.ocean_profile,
        coherent: scenario.coherent,
        bottom_depth_m,
        reference_sound_speed_mps: 1500.0,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "ocean_scenarios=info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::List => {
            for scenario in scenarios::all() {
                println!("{:<24} {}", scenario.name, scenario.description);
            }
        }
        Command::Run { name } => run_scenario(&name)?,
        Command::Export { name } => {
            let request = scenario_to_request(&name)?;
            println!("{}", toml::to_string_pretty(&request)?);
        }
        Command::Post { name, endpoint } => {
            let request = scenario_to_request(&name)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let client = reqwest::Client::new();
                let response = client.post(format!("{endpoint}/runs")).json(&request).send().await?;
                println!("{}", response.text().await?);
                Ok::<(), anyhow::Error>(())
            })?;
        }
    }

    Ok(())
}
