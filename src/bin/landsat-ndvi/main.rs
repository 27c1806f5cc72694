use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use landsat_ndvi::pipeline::{calculate_and_save_ndvi, calculate_ndvi_difference, geotiff_to_cube};

use cli::{Cli, Job};

mod cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match Job::from(cli.command) {
        Job::Ndvi(config) => calculate_and_save_ndvi(&config)
            .with_context(|| format!("computing NDVI from {}", config.red.display()))?,
        Job::Diff(config) => {
            let summary = calculate_ndvi_difference(&config).with_context(|| {
                format!("computing NDVI difference into {}", config.output.display())
            })?;
            info!("Wrote {} ({})", config.output.display(), summary);
        }
        Job::Cube(config) => {
            let cube = geotiff_to_cube(&config)
                .with_context(|| format!("building cube from {}", config.directory.display()))?;
            info!("Stacked {} rasters", cube.len());
        }
    }

    Ok(())
}
