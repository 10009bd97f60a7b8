//! Headless driver: builds a terrain world and digs a scripted stroke through it.
#![forbid(unsafe_code)]

mod app;
mod pheromone;

use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use burrow_geom::Vec3;
use burrow_world::{TerrainConfig, load_config};
use clap::Parser;
use simplelog::{ColorChoice, CombinedLogger, LevelFilter, TermLogger, TerminalMode, WriteLogger};

use app::{App, Stroke};

#[derive(Parser, Debug)]
#[command(name = "burrow", about = "Chunked destructible terrain, dug from the command line")]
struct Args {
    /// Terrain TOML; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stroke start in world space, as x,y,z
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    from: Option<Vec3>,

    /// Stroke end in world space, as x,y,z
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    to: Option<Vec3>,

    #[arg(long, default_value_t = 16)]
    steps: usize,

    #[arg(long, default_value_t = 2.0)]
    radius: f32,

    /// Pause between digs
    #[arg(long, default_value_t = 16)]
    interval_ms: u64,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z, got '{s}'"));
    }
    let mut v = [0.0f32; 3];
    for (slot, p) in v.iter_mut().zip(&parts) {
        *slot = p
            .parse::<f32>()
            .map_err(|e| format!("bad component '{p}': {e}"))?;
    }
    Ok(Vec3::new(v[0], v[1], v[2]))
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    match log_file {
        Some(path) => {
            let cfg = simplelog::Config::default();
            CombinedLogger::init(vec![
                TermLogger::new(
                    LevelFilter::Info,
                    cfg.clone(),
                    TerminalMode::Mixed,
                    ColorChoice::Auto,
                ),
                WriteLogger::new(LevelFilter::Debug, cfg, File::create(path)?),
            ])?;
        }
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => TerrainConfig::default(),
    };
    let mut app = App::new(&config)?;

    // Default stroke: a horizontal pass just under the spawn point.
    let spawn = app.world.center_surface();
    let below = spawn - Vec3::new(0.0, 4.0, 0.0);
    let stroke = Stroke {
        from: args.from.unwrap_or(below - Vec3::new(6.0, 0.0, 0.0)),
        to: args.to.unwrap_or(below + Vec3::new(6.0, 0.0, 0.0)),
        steps: args.steps,
        radius: args.radius,
        interval: Duration::from_millis(args.interval_ms),
    };
    log::info!(
        "digging {} steps r={} from {:?} to {:?}",
        stroke.steps,
        stroke.radius,
        stroke.from,
        stroke.to
    );
    let summary = app.run_stroke(&stroke)?;
    log::info!(
        "stroke done: {} digs ({} changed, {} out of bounds), {} cells, {} meshes adopted",
        summary.digs,
        summary.changed_digs,
        summary.out_of_bounds,
        summary.cells_changed,
        summary.meshes_adopted
    );
    app.log_stats();
    Ok(())
}
