//! Command-line host for velocity model point queries.
//!
//! Opens a model directory, reads `lon lat depth` points from a file or
//! stdin and writes one property record per point to stdout.

mod input;
mod output;

use std::io::{BufWriter, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use output::{write_records, OutputFormat};
use velocity_model::{PropertyRecord, VelocityModel, VERSION};

#[derive(Parser, Debug)]
#[command(name = "model-query")]
#[command(about = "Query material properties from a gridded velocity model")]
#[command(version = VERSION)]
struct Args {
    /// Directory holding the model configuration and grid files
    #[arg(short, long, env = "MODEL_DIR")]
    model_dir: PathBuf,

    /// Model label (default: the directory name)
    #[arg(short, long)]
    label: Option<String>,

    /// Points file, `lon lat depth` per line (default: stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Spread the batch across all cores
    #[arg(long)]
    parallel: bool,

    /// Print the geographic corners of the model footprint and exit
    #[arg(long)]
    corners: bool,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let label = args.label.clone().unwrap_or_else(|| {
        args.model_dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("model")
            .to_string()
    });

    let model = VelocityModel::init(&args.model_dir, &label)
        .with_context(|| format!("opening model '{}' in {}", label, args.model_dir.display()))?;

    if args.corners {
        let names = ["bottom-left", "bottom-right", "top-right", "top-left"];
        for (name, (lon, lat)) in names.iter().zip(model.corner_coordinates()?) {
            println!("{:<12} {:.6} {:.6}", name, lon, lat);
        }
        model.finalize();
        return Ok(());
    }

    let text = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    let points = input::parse_points(&text)?;
    info!(points = points.len(), parallel = args.parallel, "Querying");

    let mut records = vec![PropertyRecord::default(); points.len()];
    let result = if args.parallel {
        model.par_query(&points, &mut records)
    } else {
        model.query(&points, &mut records)
    };

    // Failed points are written as sentinel records before the error is reported.
    let stdout = std::io::stdout();
    write_records(
        &mut BufWriter::new(stdout.lock()),
        args.format,
        &points,
        &records,
    )?;
    model.finalize();

    let report = result?;
    info!(
        total = report.total,
        failed = report.failed,
        "Query complete"
    );
    Ok(())
}
