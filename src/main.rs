//! AVD Node entry point
//!
//! Resolves the environment, then hands off to the launcher. Any fatal
//! error exits the process with a non-zero status.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use avd_node::core::{EnvironmentConfig, APP_NAME, VERSION};
use avd_node::emulator::SystemRunner;
use avd_node::Launcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("{} v{} starting...", APP_NAME, VERSION);

    let config = EnvironmentConfig::from_env()?;
    let launcher = Launcher::new(config, SystemRunner::new());
    launcher.run().await
}
