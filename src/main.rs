//! AstroVision Sync CLI application
//!
//! Command-line interface for downloading AstroVision dataset archives from
//! the dataset hub and publishing locally produced results with checksums.

use std::process;

use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use astrovision_sync::cli::{
    handle_auth, handle_fetch, handle_hash, handle_list, handle_publish, Cli, Commands,
};
use astrovision_sync::config::AppConfig;
use astrovision_sync::constants::logging::DEFAULT_LOG_LEVEL;
use astrovision_sync::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // Logging comes up before a config error is reported
    let config = AppConfig::load(cli.global.config.clone()).await;
    let configured_level = config
        .as_ref()
        .map(|config| config.logging.level.clone())
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
    init_logging(&cli, &configured_level);
    let config = config?;

    info!("AstroVision Sync v{} starting", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    let quiet = cli.global.quiet;
    match cli.command {
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(args, &config, quiet).await
        }
        Commands::Publish(args) => {
            info!("Executing publish command");
            handle_publish(args, &config, quiet).await
        }
        Commands::List(args) => handle_list(args, &config).await,
        Commands::Hash(args) => handle_hash(args).await,
        Commands::Auth(args) => handle_auth(args).await,
    }
}

/// Initialize logging from the verbosity flags, falling back to the config level
fn init_logging(cli: &Cli, configured_level: &str) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| configured_level.to_lowercase());

    let mut filter = EnvFilter::from_default_env();
    match format!("astrovision_sync={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level '{}': {}", level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
