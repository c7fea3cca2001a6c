//! `confwatch` command line driver.
//!
//! Loads a configuration directory, prints it, then watches it until Ctrl-C,
//! logging every configuration change.

use clap::Parser;
use confwatch::prelude::*;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "confwatch", version, about = "Watch a directory of configuration files")]
struct Cli {
    /// Directory to watch (default: `conf` next to the executable)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// File suffix to watch, may be repeated (default: json)
    #[arg(short, long = "suffix")]
    suffixes: Vec<String>,

    /// Poll the directory at this interval instead of using native file events
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Drop a file's configuration when the file is removed
    #[arg(long)]
    track_removals: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Configuration currently in use by the driver, updated by its observer.
#[derive(Clone, Default)]
struct ModuleParams {
    current: Arc<RwLock<ConfigSnapshot>>,
}

impl ModuleParams {
    fn replace(&self, snapshot: &ConfigSnapshot) {
        *self.current.write() = snapshot.clone();
    }

    fn render(&self) -> String {
        self.current.read().to_value().to_string()
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_manager(cli: &Cli) -> Result<ConfigManager> {
    let mut builder = ConfigManager::builder()
        .with_suffixes(cli.suffixes.iter().cloned())
        .with_removal_tracking(cli.track_removals);
    if let Some(dir) = &cli.dir {
        builder = builder.directory(dir);
    }
    if let Some(ms) = cli.poll_interval_ms {
        builder = builder.with_polling(Duration::from_millis(ms));
    }
    builder.build()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut manager = build_manager(&cli)?;

    let params = ModuleParams::default();
    params.replace(&manager.snapshot());
    info!("Current configuration: {}", params.render());

    let observer_params = params.clone();
    manager.register_observer(move |snapshot| {
        observer_params.replace(snapshot);
        info!("Updated configuration: {}", observer_params.render());
    });

    manager.start()?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    manager.stop();
    manager.join()
}
