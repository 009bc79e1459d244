use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info, warn};

use edvs_noise_filter::capture::{EventSource, ReplaySource};
use edvs_noise_filter::config::Config;
use edvs_noise_filter::engine::{Engine, EngineOutput};
use edvs_noise_filter::grid::Resolution;
use edvs_noise_filter::hot_pixel::CalibrationState;
use edvs_noise_filter::slicer::SliceMode;

/// Filter hot pixels and sparse noise out of a recorded eDVS event stream.
///
/// Reads tab-separated events (x y timestamp_us polarity), replays them in
/// batches through the noise filter, and writes passing events to stdout.
/// Calibration windows are timed by event timestamps.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Recording to replay (reads stdin when omitted)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Sensor width
    #[arg(long, default_value_t = 128)]
    width: u32,

    /// Sensor height
    #[arg(long, default_value_t = 128)]
    height: u32,

    /// Events per batch
    #[arg(long, default_value_t = 1000, conflicts_with = "batch_us")]
    batch_events: usize,

    /// Batch duration in microseconds instead of a fixed event count
    #[arg(long)]
    batch_us: Option<i64>,

    /// JSON configuration file with filter tuning
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Calibrate the hot-pixel mask on the start of the recording
    #[arg(long, default_value_t = false)]
    calibrate: bool,

    /// Enable the spatial density filter
    #[arg(long, default_value_t = false)]
    density: bool,
}

fn run(cli: Cli) -> edvs_noise_filter::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    let resolution = Resolution::new(cli.width, cli.height)?;
    let mode = match cli.batch_us {
        Some(us) => SliceMode::ByTime(us.max(1)),
        None => SliceMode::ByCount(cli.batch_events.max(1)),
    };

    let mut source = match &cli.input {
        Some(path) => ReplaySource::open(path, resolution, mode)?,
        None => ReplaySource::from_reader(resolution, io::stdin().lock(), mode)?,
    };

    let mut engine = Engine::new(resolution, &config.filter)?;
    if cli.density {
        info!("{}", engine.toggle_density_filter());
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut calibration_pending = cli.calibrate;

    while let Some(batch) = source.next_batch() {
        let Some(last) = batch.last() else { continue };
        let now = last.timestamp as f64 / 1e6;
        if calibration_pending {
            calibration_pending = false;
            info!("{}", engine.start_calibration(batch[0].timestamp as f64 / 1e6));
        }
        match engine.process(&batch, now) {
            Some(EngineOutput::Data(filtered)) => {
                for event in filtered.events.events() {
                    writeln!(out, "{}", event)?;
                }
            }
            Some(EngineOutput::Status(status)) => info!("{}", status),
            None => {}
        }
    }
    out.flush()?;

    if engine.calibration_state() == CalibrationState::Calibrating {
        warn!("recording ended before the calibration window closed");
    }

    let stats = engine.stats();
    let pct = if stats.events_in > 0 {
        100.0 * stats.events_out as f64 / stats.events_in as f64
    } else {
        0.0
    };
    info!(
        "{}/{} events passed filters ({:.1}%), {} hot pixels masked",
        stats.events_out,
        stats.events_in,
        pct,
        engine.hot_pixel_mask().masked_count()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        process::exit(1);
    }
}
