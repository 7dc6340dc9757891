//! PlayClock CLI
//!
//! # Examples
//!
//! ```bash
//! # Print the current position
//! playclock state
//!
//! # Correct the clock
//! playclock seek 42.5
//! playclock pause
//! playclock play
//!
//! # Follow the clock with a simulated 10 minute video
//! playclock --server http://clock.local:3000 watch --media-duration 600
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use playclock_core::{Reconciler, SimulatedSurface, DEFAULT_DRIFT_TOLERANCE};
use playclock_http::{ClockClient, Viewer};

/// PlayClock command-line interface
#[derive(Parser)]
#[command(name = "playclock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Server base URL
    #[arg(
        short,
        long,
        global = true,
        env = "PLAYCLOCK_SERVER",
        default_value = "http://localhost:3000"
    )]
    server: String,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current snapshot
    State,

    /// Jump to a position in seconds
    Seek {
        /// Target position in seconds
        position: f64,
    },

    /// Pause the clock
    Pause,

    /// Resume the clock
    Play,

    /// Check server health
    Health,

    /// Follow the clock with a simulated local player
    Watch {
        /// Length of the local media in seconds; enables local looping
        #[arg(long)]
        media_duration: Option<f64>,

        /// Drift in seconds tolerated before a hard seek
        #[arg(long, default_value_t = DEFAULT_DRIFT_TOLERANCE)]
        drift_tolerance: f64,

        /// Seconds to wait before resubscribing
        #[arg(long, default_value_t = 2.0)]
        reconnect_delay: f64,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .init();

    let client = ClockClient::new(&cli.server)
        .with_context(|| format!("Invalid server URL: {}", cli.server))?;

    match cli.command {
        Commands::State => print_json(&client.state().await?)?,
        Commands::Seek { position } => print_json(&client.seek(position).await?)?,
        Commands::Pause => print_json(&client.pause().await?)?,
        Commands::Play => print_json(&client.play().await?)?,
        Commands::Health => {
            if client.health_check().await? {
                println!("OK");
            } else {
                anyhow::bail!("Server at {} is not healthy", cli.server);
            }
        }
        Commands::Watch {
            media_duration,
            drift_tolerance,
            reconnect_delay,
        } => {
            let delay = std::time::Duration::try_from_secs_f64(reconnect_delay)
                .context("reconnect delay must be a non-negative number of seconds")?;

            let viewer = Viewer::new(client)
                .with_reconciler(Reconciler::new(drift_tolerance))
                .with_reconnect_delay(delay);
            let mut surface = SimulatedSurface::new(media_duration);

            let stats = viewer
                .run(&mut surface, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await;
            print_json(&stats)?;
        }
    }

    Ok(())
}
