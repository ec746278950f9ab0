// fe: tile directory browser, headless front end.
// Previews: image/ffmpeg/symphonia decode → fit to tile → cache → textures
// Usage: fe [<dir>] | fe preview <dir> --scale 1.5 --out previews/

const VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_HASH: &str = env!("GIT_HASH");
const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use fe::cli::{self, PreviewOptions};
use fe::config::{self, Config};
use fe::logging;

#[derive(Parser, Debug)]
#[command(name = "fe", about = "File explorer with media previews", version = LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: platform config dir, or $FE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory to preview
    #[arg(trailing_var_arg = true)]
    paths: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build previews for every tile in a directory and report them
    Preview {
        dir: PathBuf,
        /// Zoom level (clamped to the configured range)
        #[arg(long)]
        scale: Option<f32>,
        /// Write each decoded preview as PNG into this directory
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
        /// Keep watching the directory this many seconds after settling
        #[arg(long, default_value_t = 0)]
        follow: u64,
    },
    /// Print the media category of files
    Classify {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

fn load_config(explicit: Option<&PathBuf>) -> Result<(Config, PathBuf)> {
    match explicit {
        Some(p) => Ok((Config::load_from(p)?, p.clone())),
        None => Config::load(),
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // ── Config + logging ────────────────────────────────────────────────
    let (config, config_path) = load_config(args.config.as_ref())?;

    let log_dir = config::data_dir().ok().map(|d| d.join("logs"));
    let log_dir = log_dir.filter(|d| std::fs::create_dir_all(d).is_ok());
    let _logger = logging::init(
        &logging::level_spec(&config.log.level, args.debug),
        log_dir.as_deref(),
    )
    .context("starting logger")?;
    log::info!("fe {} ({}), config {}", VERSION, GIT_HASH, config_path.display());

    // ── Subcommands ─────────────────────────────────────────────────────
    let cmd = match args.command {
        Some(cmd) => cmd,
        None => Commands::Preview {
            dir: args.paths.first().cloned().unwrap_or_else(|| PathBuf::from(".")),
            scale: None,
            out: None,
            json: false,
            timeout_secs: 120,
            follow: 0,
        },
    };

    match cmd {
        Commands::Preview {
            dir,
            scale,
            out,
            json,
            timeout_secs,
            follow,
        } => {
            let opts = PreviewOptions {
                dir,
                scale,
                out,
                deadline: Duration::from_secs(timeout_secs),
                follow: Duration::from_secs(follow),
            };
            cli::preview(config, &opts, json)
        }
        Commands::Classify { paths, json } => cli::classify(&paths, json),
        Commands::Config => cli::show_config(&config, &config_path),
    }
}
