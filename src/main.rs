use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use strain_rates::config::Config;
use strain_rates::pipeline::Pipeline;

/// Compute attraction and repulsion rate fields from a 2D velocity field
#[derive(Parser)]
#[command(name = "strain-rates")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Attraction and repulsion rates of 2D velocity fields", long_about = None)]
struct Cli {
    /// TOML run configuration
    config: PathBuf,

    /// Log filter (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Skip writing PNG output
    #[arg(long)]
    no_plots: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .parse_filters(&cli.log_level)
        .format_target(false)
        .init();

    let config = Config::from_file(&cli.config)?;
    config.log_summary();

    let pipeline = Pipeline::new(config)?;
    let summary = pipeline.run(!cli.no_plots)?;

    info!(
        "Done: {}x{} grid, {} masked points, {} file(s) written",
        summary.shape.0,
        summary.shape.1,
        summary.masked,
        summary.outputs.len()
    );
    Ok(())
}
