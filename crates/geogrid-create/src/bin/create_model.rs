//! Command-line front end for building models.
//!
//! ```bash
//! create-model --config=model.cfg,site.cfg --all
//! create-model --config=model.cfg --import-surfaces --import-blocks
//! create-model --config=model.cfg --update-metadata
//! ```

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use geogrid_common::Config;
use geogrid_create::{resolve_data_source, BuildSteps, Builder};

#[derive(Parser, Debug)]
#[command(name = "create-model")]
#[command(about = "Build a georeferenced grid model from a data source")]
struct Args {
    /// Configuration file(s); later files override earlier ones
    #[arg(long, value_delimiter = ',', required = true)]
    config: Vec<PathBuf>,

    /// Print the merged configuration and exit
    #[arg(long)]
    show_parameters: bool,

    /// Write the domain attributes
    #[arg(long)]
    import_domain: bool,

    /// Build the surfaces
    #[arg(long)]
    import_surfaces: bool,

    /// Build the blocks
    #[arg(long)]
    import_blocks: bool,

    /// Rewrite root and dataset attributes without touching grids
    #[arg(long)]
    update_metadata: bool,

    /// Run domain, surfaces, and blocks
    #[arg(long)]
    all: bool,

    /// Only log warnings and errors
    #[arg(long)]
    quiet: bool,

    /// Write the log to a file instead of stderr
    #[arg(long)]
    log: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

fn init_logging(args: &Args) -> Result<()> {
    let level = if args.debug {
        Level::DEBUG
    } else if args.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
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

fn show_parameters(config: &Config) {
    for (section, keys) in config.sections() {
        println!("[{section}]");
        for (key, value) in keys {
            println!("{key} = {value}");
        }
        println!();
    }
}

fn run(args: &Args) -> Result<()> {
    let config = Config::load(&args.config)?;
    if args.show_parameters {
        show_parameters(&config);
        return Ok(());
    }

    let steps = if args.all {
        BuildSteps {
            update_metadata: args.update_metadata,
            ..BuildSteps::all()
        }
    } else {
        BuildSteps {
            domain: args.import_domain,
            surfaces: args.import_surfaces,
            blocks: args.import_blocks,
            update_metadata: args.update_metadata,
        }
    };
    if !(steps.domain || steps.surfaces || steps.blocks || steps.update_metadata) {
        anyhow::bail!(
            "nothing to do; pass --all, --import-domain, --import-surfaces, \
             --import-blocks, or --update-metadata"
        );
    }

    let mut builder = Builder::new(&config)?;
    let mut source = resolve_data_source(&config)?;
    builder.run(steps, source.as_mut())?;
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
