//! tilewarm CLI - Command-line driver for the prefetch engine
//!
//! Plans and runs cache-warming passes for a deep-zoom image served over
//! the DeepZoom tile protocol.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::{PrefetchOverrides, ViewportArgs};
use commands::config::ConfigCommands;
use commands::plan::PlanArgs;
use commands::warm::WarmArgs;

#[derive(Parser)]
#[command(name = "tilewarm")]
#[command(version = tilewarm::VERSION)]
#[command(about = "Predictive tile prefetching for deep-zoom images", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.tilewarm/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the ranked prefetch candidates for a viewport (no network)
    Plan {
        /// Saved DeepZoom descriptor (JSON from /deepzoom/{id}/info)
        #[arg(long)]
        info: PathBuf,

        /// Tile server base URL used to build tile URLs
        #[arg(long, default_value = "http://localhost:8000")]
        base_url: String,

        /// Image identifier on the tile server
        #[arg(long)]
        image_id: String,

        #[command(flatten)]
        viewport: ViewportArgs,

        /// Horizontal pan velocity (image widths per second)
        #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
        vx: f64,

        /// Vertical pan velocity (image heights per second)
        #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
        vy: f64,

        #[command(flatten)]
        overrides: PrefetchOverrides,

        /// Show at most this many candidates
        #[arg(long)]
        limit: Option<usize>,

        /// Print one JSON object per candidate
        #[arg(long)]
        json: bool,
    },

    /// Warm the tile cache around a viewport
    Warm {
        /// Tile server base URL
        #[arg(long)]
        base_url: String,

        /// Image identifier on the tile server
        #[arg(long)]
        image_id: String,

        #[command(flatten)]
        viewport: ViewportArgs,

        #[command(flatten)]
        overrides: PrefetchOverrides,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Plan {
            info,
            base_url,
            image_id,
            viewport,
            vx,
            vy,
            overrides,
            limit,
            json,
        } => commands::plan::run(PlanArgs {
            config_path: cli.config,
            info,
            base_url,
            image_id,
            viewport,
            vx,
            vy,
            overrides,
            limit,
            json,
        }),
        Commands::Warm {
            base_url,
            image_id,
            viewport,
            overrides,
            timeout,
        } => commands::warm::run(WarmArgs {
            config_path: cli.config,
            base_url,
            image_id,
            viewport,
            overrides,
            timeout,
        }),
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
    };

    if let Err(e) = result {
        e.exit();
    }
}
