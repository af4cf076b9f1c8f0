//! Command-line front end for querying models.
//!
//! ```bash
//! query-model --models=detailed.geogrid,regional.geogrid \
//!     --values=Vp,Vs --points=stations.txt --points-crs=EPSG:4326 \
//!     --output=values.txt
//! ```
//!
//! The points file holds one `x y z` triple per line in the points CRS;
//! `#` starts a comment. Each output line repeats the input coordinates
//! followed by the interpolated values.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use geogrid_query::{QueryDriver, SquashSurface};

#[derive(Parser, Debug)]
#[command(name = "query-model")]
#[command(about = "Query georeferenced grid models at a set of points")]
struct Args {
    /// Model file(s), in search order
    #[arg(long, value_delimiter = ',', required = true)]
    models: Vec<PathBuf>,

    /// Value names to return, in output order
    #[arg(long, value_delimiter = ',', required = true)]
    values: Vec<String>,

    /// File of points to query (one "x y z" per line)
    #[arg(long, required = true)]
    points: PathBuf,

    /// CRS of the points file
    #[arg(long, default_value = "EPSG:4326")]
    points_crs: String,

    /// Output file; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// Squash elevations above this value so the surface maps to z=0
    #[arg(long)]
    squash_min_elev: Option<f64>,

    /// Surface squashing references: top_surface or topography_bathymetry
    #[arg(long)]
    squash_surface: Option<String>,

    /// Write the log to a file instead of stderr
    #[arg(long)]
    log: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

fn init_logging(args: &Args) -> Result<()> {
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    match &args.log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file '{}'", path.display()))?;
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_max_level(level).init();
        }
    }
    Ok(())
}

fn read_points(path: &PathBuf) -> Result<Vec<[f64; 3]>> {
    let file =
        File::open(path).with_context(|| format!("cannot open points '{}'", path.display()))?;
    let mut points = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<f64> = trimmed
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .with_context(|| format!("{}:{}: bad number '{token}'", path.display(), lineno + 1))
            })
            .collect::<Result<_>>()?;
        if fields.len() != 3 {
            anyhow::bail!(
                "{}:{}: expected 'x y z', got {} fields",
                path.display(),
                lineno + 1,
                fields.len()
            );
        }
        points.push([fields[0], fields[1], fields[2]]);
    }
    Ok(points)
}

fn parse_squash_surface(name: &str) -> Result<SquashSurface> {
    match name {
        "top_surface" => Ok(SquashSurface::TopSurface),
        "topography_bathymetry" => Ok(SquashSurface::TopographyBathymetry),
        other => anyhow::bail!(
            "unknown squash surface '{other}'; expected top_surface or topography_bathymetry"
        ),
    }
}

fn run(args: &Args) -> Result<()> {
    let points = read_points(&args.points)?;

    let mut driver = QueryDriver::new();
    if let Some(min_elev) = args.squash_min_elev {
        driver.set_squash_min_elev(min_elev);
    }
    if let Some(name) = &args.squash_surface {
        driver.set_squash_surface(parse_squash_surface(name)?);
    }
    driver.initialize(&args.models, &args.values, &args.points_crs)?;

    let (values, errors) = driver.query(&points)?;
    let num_values = driver.num_values();

    let mut out: BufWriter<Box<dyn Write>> = BufWriter::new(match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("cannot create output '{}'", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    });
    writeln!(out, "# {}", args.values.join(" "))?;
    for (row, point) in points.iter().enumerate() {
        write!(out, "{:.6e} {:.6e} {:.6e}", point[0], point[1], point[2])?;
        for value in &values[row * num_values..(row + 1) * num_values] {
            write!(out, " {value:.6e}")?;
        }
        writeln!(out)?;
    }
    out.flush()?;

    let failed = errors.iter().filter(|&&flag| flag != 0).count();
    if failed > 0 {
        tracing::warn!(failed, total = points.len(), "points outside all models");
    }
    driver.finalize();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_logging(&args) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
