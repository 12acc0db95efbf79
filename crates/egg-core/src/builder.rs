//! Builder for constructing a [`PriceService`] from configuration.
//!
//! The storage backend named by `storage.primary` is created through its
//! factory, checked against its own configuration schema, prepared
//! (migrations and location seeding) and wrapped in a service that carries
//! the API's validation policy and default limit.

use crate::PriceService;
use egg_config::Config;
use egg_storage::{StorageError, StorageInterface};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during service construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Storage setup failed: {0}")]
	Storage(#[from] StorageError),
}

/// Builder for constructing a PriceService with a pluggable store.
pub struct PriceServiceBuilder {
	config: Config,
}

impl PriceServiceBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the service using the factory registered for the primary backend.
	pub async fn build<SF>(
		self,
		storage_factories: HashMap<String, SF>,
	) -> Result<PriceService, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let primary = &self.config.storage.primary;

		for name in self.config.storage.implementations.keys() {
			if name != primary {
				tracing::debug!(component = "storage", implementation = %name, "Skipped, not primary");
			}
		}

		let storage_config = self.config.primary_storage_config().ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' not found in implementations",
				primary
			))
		})?;

		let factory = storage_factories.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Unknown storage implementation '{}'", primary))
		})?;

		let storage = factory(storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary, e
			))
		})?;

		storage
			.config_schema()
			.validate(storage_config)
			.map_err(|e| {
				BuilderError::Config(format!(
					"Invalid configuration for storage implementation '{}': {}",
					primary, e
				))
			})?;
		tracing::info!(component = "storage", implementation = %primary, "Loaded");

		storage.prepare().await?;

		Ok(PriceService::new(storage)
			.with_policy(self.config.api.validation)
			.with_default_limit(self.config.api.default_limit))
	}
}
