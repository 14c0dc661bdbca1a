use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use gridsort::common::config::{Config, config_file};
use gridsort::common::log;
use gridsort::layout_engine::{ItemSize, LayoutId, LayoutRequest, LayoutResult, Packer, PackerOptions, PackerPool};
use gridsort::sys::geometry::Size;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a JSON array of item sizes and print the slots as JSON.
    Pack(PackArgs),
    /// Check the configuration file and print every issue found.
    Validate,
}

#[derive(Args)]
struct PackArgs {
    /// Container width.
    #[arg(long)]
    width: f64,

    /// Container height.
    #[arg(long)]
    height: f64,

    /// Fill rows left to right instead of columns top to bottom.
    #[arg(long)]
    horizontal: bool,

    /// Place items into earlier gaps instead of only after the last item.
    #[arg(long)]
    fill_gaps: bool,

    #[arg(long)]
    align_right: bool,

    #[arg(long)]
    align_bottom: bool,

    /// Snap item sizes to hundredths of a pixel before packing.
    #[arg(long)]
    rounding: bool,

    /// Pack on this many worker threads instead of the current one.
    #[arg(long)]
    workers: Option<usize>,

    /// JSON input. Reads stdin when omitted or `-`.
    file: Option<PathBuf>,
}

#[derive(Serialize)]
struct Slot {
    left: f64,
    top: f64,
}

#[derive(Serialize)]
struct PackOutput {
    width: f64,
    height: f64,
    slots: Vec<Slot>,
}

impl From<LayoutResult> for PackOutput {
    fn from(result: LayoutResult) -> Self {
        PackOutput {
            width: result.width,
            height: result.height,
            slots: result.slots.chunks_exact(2).map(|slot| Slot { left: slot[0], top: slot[1] }).collect(),
        }
    }
}

fn main() {
    sigpipe::reset();
    let opt = Cli::parse();
    log::init_logging();

    let config_path = opt.config.clone().or_else(config_file);
    let result = match &opt.command {
        Commands::Pack(args) => pack(config_path, args),
        Commands::Validate => validate(config_path),
    };
    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{e:#}");
            process::exit(1);
        }
    }
}

fn validate(config_path: Option<PathBuf>) -> anyhow::Result<bool> {
    let Some(path) = config_path.filter(|path| path.exists()) else {
        println!("No config file found, using defaults");
        return Ok(true);
    };
    let config = Config::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config validation passed");
        return Ok(true);
    }
    for issue in issues {
        eprintln!("{issue}");
    }
    Ok(false)
}

impl PackArgs {
    fn packer_options(&self) -> PackerOptions {
        let mut options = PackerOptions::empty();
        options.set(PackerOptions::HORIZONTAL, self.horizontal);
        options.set(PackerOptions::FILL_GAPS, self.fill_gaps);
        options.set(PackerOptions::ALIGN_RIGHT, self.align_right);
        options.set(PackerOptions::ALIGN_BOTTOM, self.align_bottom);
        options.set(PackerOptions::ROUNDING, self.rounding);
        options
    }
}

fn pack(config_path: Option<PathBuf>, args: &PackArgs) -> anyhow::Result<bool> {
    let config = Config::load_or_default(config_path.as_deref())?;
    // Flags only switch options on; the config decides the rest.
    let options = config.layout.packer_options() | args.packer_options();
    if !(args.width >= 0.0 && args.height >= 0.0) {
        bail!("container size must be non-negative, got {}x{}", args.width, args.height);
    }

    let input = match args.file.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        }
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let items: Vec<ItemSize> = serde_json::from_str(&input).context("parsing item sizes")?;
    debug!(count = items.len(), ?options, "Packing");

    let request = LayoutRequest::new(LayoutId(1), &items, Size::new(args.width, args.height), options);
    let workers = args.workers.unwrap_or(config.layout.workers);
    let result = if workers > 0 {
        let pool = PackerPool::new(workers)?;
        pool.submit(0u64, &request)?;
        let mut finished = Vec::new();
        while finished.is_empty() && pool.is_pending(0) {
            finished = pool.wait(Duration::from_millis(100));
        }
        match finished.pop() {
            Some((_, result)) => result,
            None => bail!("packing worker returned no layout"),
        }
    } else {
        Packer::new().run(&request)
    };
    info!(width = result.width, height = result.height, "Packed {} items", result.len());

    let output = serde_json::to_string_pretty(&PackOutput::from(result))?;
    println!("{output}");
    Ok(true)
}
