use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use landsat_ndvi::{
    AlignConfig, CubeConfig, DiffConfig, NdviConfig, NdviParams, NonFinitePolicy, Resampling,
    SceneFiles, NODATA,
};

#[derive(Parser)]
#[command(name = "landsat-ndvi")]
#[command(version, about = "NDVI, NDVI change and GeoTIFF time cubes for Landsat scenes")]
pub struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// NDVI of a single acquisition
    Ndvi {
        /// Red band (Landsat 8 B4)
        #[arg(long)]
        red: PathBuf,
        /// Near-infrared band (Landsat 8 B5)
        #[arg(long)]
        nir: PathBuf,
        /// Optional QA band; pixels equal to 1 become nodata
        #[arg(long)]
        qa: Option<PathBuf>,
        /// Output GeoTIFF
        #[arg(short, long, default_value = "ndvi.tif")]
        output: PathBuf,
        #[command(flatten)]
        ndvi: NdviArgs,
    },
    /// NDVI difference between two acquisitions (first minus second)
    Diff {
        /// Red, NIR and QA bands of the first acquisition
        #[arg(
            long,
            num_args = 3,
            value_names = ["RED", "NIR", "QA"],
            required = true,
            action = ArgAction::Set
        )]
        first: Vec<PathBuf>,
        /// Red, NIR and QA bands of the second acquisition
        #[arg(
            long,
            num_args = 3,
            value_names = ["RED", "NIR", "QA"],
            required = true,
            action = ArgAction::Set
        )]
        second: Vec<PathBuf>,
        /// Output GeoTIFF
        #[arg(short, long, default_value = "diff_ndvi.tif")]
        output: PathBuf,
        /// Target pixel size as dx,dy
        #[arg(long, default_value = "120,-120", value_parser = parse_pair::<f64>)]
        pixel_size: (f64, f64),
        /// Resampling for red and NIR bands
        #[arg(long, value_enum, default_value_t = ResamplingArg::Nearest)]
        resampling: ResamplingArg,
        /// Keep the aligned rasters in this directory
        #[arg(long)]
        aligned_dir: Option<PathBuf>,
        #[command(flatten)]
        ndvi: NdviArgs,
    },
    /// Stack a directory of GeoTIFFs along time
    Cube {
        /// Directory holding NAME_YYYYMM*.tif files
        directory: PathBuf,
        /// NetCDF output
        #[arg(long)]
        netcdf: Option<PathBuf>,
        /// CSV output with the time series of one pixel
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Pixel for the CSV time series as x,y
        #[arg(long, default_value = "200,200", value_parser = parse_pair::<usize>)]
        pixel: (usize, usize),
    },
}

#[derive(Args)]
pub struct NdviArgs {
    /// Value written where NDVI is undefined
    #[arg(long, default_value_t = NODATA, allow_negative_numbers = true)]
    nodata: f32,
    /// Handling of pixels where NIR + red is zero
    #[arg(long, value_enum, default_value_t = PolicyArg::Propagate)]
    non_finite: PolicyArg,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Propagate,
    ForceNodata,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ResamplingArg {
    Nearest,
    Bilinear,
    Cubic,
}

impl From<PolicyArg> for NonFinitePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Propagate => NonFinitePolicy::Propagate,
            PolicyArg::ForceNodata => NonFinitePolicy::ForceNodata,
        }
    }
}

impl From<ResamplingArg> for Resampling {
    fn from(arg: ResamplingArg) -> Self {
        match arg {
            ResamplingArg::Nearest => Resampling::Nearest,
            ResamplingArg::Bilinear => Resampling::Bilinear,
            ResamplingArg::Cubic => Resampling::Cubic,
        }
    }
}

impl From<&NdviArgs> for NdviParams {
    fn from(args: &NdviArgs) -> Self {
        NdviParams {
            nodata: args.nodata,
            non_finite: args.non_finite.into(),
        }
    }
}

fn parse_pair<T: FromStr>(s: &str) -> Result<(T, T), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated values, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<T>()
            .map_err(|_| format!("invalid value '{v}' in '{s}'"))
    };
    Ok((parse(a)?, parse(b)?))
}

fn scene(paths: &[PathBuf]) -> SceneFiles {
    SceneFiles::new(paths[0].clone(), paths[1].clone(), paths[2].clone())
}

/// Run configuration built from the parsed command line.
pub enum Job {
    Ndvi(NdviConfig),
    Diff(DiffConfig),
    Cube(CubeConfig),
}

impl From<Command> for Job {
    fn from(command: Command) -> Self {
        match command {
            Command::Ndvi {
                red,
                nir,
                qa,
                output,
                ndvi,
            } => Job::Ndvi(NdviConfig {
                red,
                nir,
                qa,
                output,
                params: (&ndvi).into(),
            }),
            Command::Diff {
                first,
                second,
                output,
                pixel_size,
                resampling,
                aligned_dir,
                ndvi,
            } => Job::Diff(DiffConfig {
                t1: scene(&first),
                t2: scene(&second),
                output,
                align: AlignConfig {
                    pixel_size,
                    resampling: resampling.into(),
                    aligned_dir,
                },
                params: (&ndvi).into(),
            }),
            Command::Cube {
                directory,
                netcdf,
                csv,
                pixel,
            } => Job::Cube(CubeConfig {
                netcdf,
                csv,
                pixel,
                ..CubeConfig::new(directory)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair::<f64>("120,-120").unwrap(), (120.0, -120.0));
        assert_eq!(parse_pair::<usize>("200, 10").unwrap(), (200, 10));
        assert!(parse_pair::<usize>("200").is_err());
        assert!(parse_pair::<usize>("a,1").is_err());
    }

    #[test]
    fn test_diff_command_builds_config() {
        let cli = Cli::try_parse_from([
            "landsat-ndvi",
            "diff",
            "--first",
            "r1.tif",
            "n1.tif",
            "q1.tif",
            "--second",
            "r2.tif",
            "n2.tif",
            "q2.tif",
            "--non-finite",
            "force-nodata",
            "--pixel-size=30,-30",
        ])
        .unwrap();

        let Job::Diff(config) = Job::from(cli.command) else {
            panic!("expected diff job");
        };
        assert_eq!(config.t2.qa, PathBuf::from("q2.tif"));
        assert_eq!(config.align.pixel_size, (30.0, -30.0));
        assert_eq!(config.params.nodata, NODATA);
        assert_eq!(config.params.non_finite, NonFinitePolicy::ForceNodata);
        assert_eq!(config.output, PathBuf::from("diff_ndvi.tif"));
    }

    #[test]
    fn test_diff_scene_given_twice_is_rejected() {
        let result = Cli::try_parse_from([
            "landsat-ndvi",
            "diff",
            "--first",
            "r1.tif",
            "n1.tif",
            "q1.tif",
            "--first",
            "r3.tif",
            "n3.tif",
            "q3.tif",
            "--second",
            "r2.tif",
            "n2.tif",
            "q2.tif",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cube_command_defaults() {
        let cli =
            Cli::try_parse_from(["landsat-ndvi", "cube", "../data", "--csv", "AET.csv"]).unwrap();
        let Job::Cube(config) = Job::from(cli.command) else {
            panic!("expected cube job");
        };
        assert_eq!(config.pixel, (200, 200));
        assert_eq!(config.csv, Some(PathBuf::from("AET.csv")));
        assert!(config.netcdf.is_none());
    }
}
