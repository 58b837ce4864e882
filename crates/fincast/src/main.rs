use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::eyre;
use fincast::{LogTarget, OutputView, default_log_path, init_logging, load_model, write_json};
use fincast_core::{SimulationOptions, ViewFrequency, run_simulation};
use jiff::civil::Date;

#[derive(Parser, Debug)]
#[command(name = "fincast")]
#[command(about = "Simulate a household's finances and UK taxes over time")]
struct Args {
    /// Model file (JSON, or YAML with a .yaml/.yml extension)
    model: PathBuf,

    /// Snapshot date for the "today" values (default: the current date)
    #[arg(long)]
    today: Option<Date>,

    /// View frequency override: Monthly, Annually or Weekly
    #[arg(long)]
    frequency: Option<String>,

    /// Include the report feed
    #[arg(long)]
    report: bool,

    /// Report only subjects whose name contains this text (implies --report)
    #[arg(long)]
    filter: Option<String>,

    /// Include the "today" snapshots
    #[arg(long)]
    snapshots: bool,

    /// Write the JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log to a file instead of stderr (default: ~/.fincast/fincast.log)
    #[arg(long, num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let log_target = match &args.log_file {
        Some(path) => LogTarget::File(path.clone().unwrap_or_else(default_log_path)),
        None => LogTarget::Stderr,
    };
    init_logging(&log_target, &args.log_level)?;

    let model = load_model(&args.model)?;

    let mut options = match args.today {
        Some(today) => SimulationOptions::new(today),
        None => SimulationOptions::default(),
    };
    if let Some(frequency) = &args.frequency {
        let frequency: ViewFrequency = frequency.parse().map_err(|e: String| eyre!(e))?;
        options = options.with_frequency(frequency);
    }
    let view = OutputView {
        report: args.report,
        snapshots: args.snapshots,
        filter: args.filter.clone(),
    };
    let options = view.apply(options);

    let output = run_simulation(&model, &options)?;
    let rendered = view.render(&output)?;

    match &args.output {
        Some(path) => {
            write_json(path, &rendered)?;
            tracing::info!(path = %path.display(), "results written");
        }
        None => println!("{}", serde_json::to_string_pretty(&rendered)?),
    }
    Ok(())
}
