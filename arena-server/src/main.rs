//! Arena Server - Main entry point.

use anyhow::Result;
use arena_common::config::{config_dir, Config};
use arena_common::config_loader::check_config_files;
use arena_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load and validate configuration
    let config = Config::load_and_validate()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Arena Server v{}", env!("CARGO_PKG_VERSION"));

    let dir = config_dir();
    for (file, present) in check_config_files(&dir) {
        tracing::debug!(file = %file, present, dir = %dir.display(), "Config file");
    }

    arena_server::start_server(&config).await
}
