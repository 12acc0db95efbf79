//! Main entry point for the egg price tracker service.
//!
//! Loads the configuration, connects the configured store and serves the
//! price API until interrupted.

use clap::Parser;
use egg_config::Config;
use egg_core::{PriceService, PriceServiceBuilder};
use egg_storage::StorageFactory;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the egg price tracker.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "EGG_TRACKER_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the price service over the primary store
/// 5. Serves the HTTP API until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started egg tracker");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let service = Arc::new(build_service(config.clone()).await?);

	server::start_server(config.api, service).await?;

	tracing::info!("Stopped egg tracker");
	Ok(())
}

/// Maps every known storage backend name to its factory.
fn storage_factories() -> HashMap<String, StorageFactory> {
	egg_storage::get_all_implementations()
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect()
}

async fn build_service(config: Config) -> Result<PriceService, Box<dyn std::error::Error>> {
	let service = PriceServiceBuilder::new(config)
		.build(storage_factories())
		.await?;
	tracing::info!(policy = %service.policy(), "Price service ready");
	Ok(service)
}
