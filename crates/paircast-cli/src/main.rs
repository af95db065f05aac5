//! Paircast CLI entry point

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;

use paircast_cli::{
    app::PaircastApp,
    cli::{Cli, Commands},
    config::CliAppConfig,
    store::JsonPreferenceStore,
};
use paircast_core::prefs::PreferenceStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = CliAppConfig::load(cli.config.as_deref().map(Path::new))?;
    if let Some(data_dir) = &cli.data_dir {
        config.cli.data_dir = Some(PathBuf::from(data_dir));
    }

    match cli.command {
        Commands::Run { address } => {
            let app = PaircastApp::start(config)?;
            app.run_interactive(address).await?;
            info!("paircast exited");
        }
        Commands::Recent => {
            let store = JsonPreferenceStore::open(&config.data_dir())?;
            let servers = store.recent_servers();
            if servers.is_empty() {
                println!("no recent servers");
            }
            for server in servers {
                println!("{server}");
            }
        }
    }
    Ok(())
}

fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}
