use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod effects;
mod host;

fn main() -> demo_sync_core::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Play {
            cues,
            config,
            seconds,
            bpm,
            orders,
        } => {
            tracing::info!(?cues, ?config, "starting playback");
            host::play(&host::PlayOptions {
                cues,
                config,
                seconds,
                bpm,
                orders,
            })
        }
        Commands::CheckCues { file } => host::check_cues(&file),
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Tracker-synced demo player", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play the built-in synthetic module with synced visuals.
    ///
    /// Type `q` then Enter to quit, `d` then Enter to toggle the overlay.
    Play {
        /// JSON cue file; the built-in running order is used otherwise.
        #[arg(short, long)]
        cues: Option<PathBuf>,
        /// JSON configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Stop after this many seconds.
        #[arg(short, long)]
        seconds: Option<f32>,
        #[arg(long, default_value_t = 125)]
        bpm: u32,
        /// Number of orders in the synthetic module.
        #[arg(long, default_value_t = 8)]
        orders: u32,
    },
    /// Validate a cue file against the built-in effects.
    CheckCues {
        file: PathBuf,
    },
}
