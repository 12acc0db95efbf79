//! Storage module for the egg price tracker.
//!
//! This module defines the interface every price store implements and the
//! backends available to the service: an in-memory store for tests and local
//! development, and a PostgreSQL store for production. Backends are selected
//! by name from `storage.primary` and built through factory functions.

use async_trait::async_trait;
use egg_types::{
	ConfigSchema, ImplementationRegistry, LatestPrice, Location, LocationSeed,
	NewPriceObservation, PriceFilter, PriceObservation,
};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod postgres;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// A write was rejected by a table constraint, e.g. a duplicate (date, location).
	#[error("Constraint violation: {0}")]
	Constraint(String),
	/// The store could not be reached.
	#[error("Connection error: {0}")]
	Connection(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for price stores.
///
/// Every method is a single read or a single insert; implementations do not
/// need transactions. Observations are never updated or deleted.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Returns observations matching the filter, newest date first.
	///
	/// Rows sharing a date are ordered by id descending.
	async fn list_prices(&self, filter: &PriceFilter)
		-> Result<Vec<PriceObservation>, StorageError>;

	/// Persists a new observation and returns it with its generated id.
	async fn insert_price(
		&self,
		price: &NewPriceObservation,
	) -> Result<PriceObservation, StorageError>;

	/// Returns all registered locations ordered by name.
	async fn list_locations(&self) -> Result<Vec<Location>, StorageError>;

	/// Returns the most recent observation of every location, ordered by location.
	///
	/// The most recent observation has the greatest date; ties go to the
	/// greatest id.
	async fn latest_prices(&self) -> Result<Vec<LatestPrice>, StorageError>;

	/// Checks that the store is reachable.
	async fn ping(&self) -> Result<(), StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// One-time setup before serving requests, such as creating tables and
	/// registering the configured locations.
	async fn prepare(&self) -> Result<(), StorageError> {
		Ok(())
	}
}

/// Reads the optional `locations = [{ name, type }, ...]` seed of a backend table.
pub(crate) fn location_seed(config: &toml::Value) -> Result<Vec<LocationSeed>, StorageError> {
	let Some(value) = config.get("locations") else {
		return Ok(Vec::new());
	};

	let seed: Vec<LocationSeed> = value
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| {
			StorageError::Configuration(format!("invalid locations: {}", e.message()))
		})?;

	if let Some(blank) = seed.iter().find(|l| l.name.is_empty()) {
		return Err(StorageError::Configuration(format!(
			"location name cannot be empty (type '{}')",
			blank.location_type
		)));
	}

	Ok(seed)
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples, used by the service to build
/// the backend named in configuration.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{memory, postgres};

	vec![
		(memory::Registry::NAME, memory::Registry::factory()),
		(postgres::Registry::NAME, postgres::Registry::factory()),
	]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<&str> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["memory", "postgres"]);
	}

	#[test]
	fn test_location_seed_parsing() {
		let config: toml::Value = toml::from_str(
			r#"
locations = [
	{ name = "NATIONAL", type = "national" },
	{ name = "Texas", type = "state" },
]
"#,
		)
		.unwrap();
		let seed = location_seed(&config).unwrap();
		assert_eq!(seed.len(), 2);
		assert_eq!(seed[0].name, "NATIONAL");
		assert_eq!(seed[1].location_type, "state");

		let empty: toml::Value = toml::from_str("").unwrap();
		assert!(location_seed(&empty).unwrap().is_empty());

		let missing_type: toml::Value =
			toml::from_str(r#"locations = [{ name = "Texas" }]"#).unwrap();
		assert!(matches!(
			location_seed(&missing_type),
			Err(StorageError::Configuration(_))
		));

		let blank: toml::Value =
			toml::from_str(r#"locations = [{ name = "", type = "state" }]"#).unwrap();
		assert!(location_seed(&blank).is_err());
	}
}
