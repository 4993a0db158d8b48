mod commands;
mod render;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use staysync_core::config::Config;
use staysync_core::store::Store;

#[derive(Parser)]
#[command(name = "staysync")]
#[command(about = "Sync vacation-rental bookings from external iCal calendar feeds")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch enabled feeds and reconcile bookings
    Sync {
        /// Only sync this source (by id)
        #[arg(short, long)]
        source: Option<i64>,

        /// Only sync sources belonging to this property (by id)
        #[arg(short, long)]
        property: Option<i64>,

        /// Run even if a sync started inside the debounce window
        #[arg(long)]
        force: bool,
    },
    /// List configured feed sources and their sync state
    Sources,
    /// List upcoming bookings
    Bookings {
        /// Only show bookings of this unit (by id)
        #[arg(short, long)]
        unit: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let store = Store::open(&config.database_path).await?;

    match cli.command {
        Commands::Sync {
            source,
            property,
            force,
        } => commands::sync::run(store, config, source, property, force).await,
        Commands::Sources => commands::sources::run(store).await,
        Commands::Bookings { unit } => commands::bookings::run(store, unit).await,
    }
}
