//! In-memory storage backend.
//!
//! Keeps both tables in vectors behind a read-write lock. It mirrors the
//! behaviour of the PostgreSQL backend, including the unique (date, location)
//! constraint, so it can stand in for the database in tests and local runs.
//! Nothing survives a restart.
//!
//! Configuration parameters:
//! - `locations` (optional): `[{ name, type }, ...]` registered by `prepare`

use crate::{location_seed, StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use chrono::Utc;
use egg_types::{
	ConfigSchema, ImplementationRegistry, LatestPrice, Location, LocationSeed,
	NewPriceObservation, PriceFilter, PriceObservation, Schema, ValidationError,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
	prices: Vec<PriceObservation>,
	locations: Vec<Location>,
	next_price_id: i32,
	next_location_id: i32,
}

/// In-memory storage implementation.
pub struct MemoryStorage {
	tables: Arc<RwLock<Tables>>,
	seed: Vec<LocationSeed>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self {
			tables: Arc::new(RwLock::new(Tables::default())),
			seed: Vec::new(),
		}
	}

	/// Sets the locations registered by [`StorageInterface::prepare`].
	pub fn with_locations(mut self, seed: Vec<LocationSeed>) -> Self {
		self.seed = seed;
		self
	}

	/// Registers a location unless one with the same name exists.
	///
	/// Returns the stored location either way.
	pub async fn register_location(&self, name: &str, location_type: &str) -> Location {
		let mut tables = self.tables.write().await;

		if let Some(existing) = tables.locations.iter().find(|l| l.name == name) {
			return existing.clone();
		}

		tables.next_location_id += 1;
		let location = Location {
			id: tables.next_location_id,
			name: name.to_string(),
			location_type: location_type.to_string(),
		};
		tables.locations.push(location.clone());
		location
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn list_prices(
		&self,
		filter: &PriceFilter,
	) -> Result<Vec<PriceObservation>, StorageError> {
		let limit = usize::try_from(filter.limit)
			.map_err(|_| StorageError::Backend("LIMIT must not be negative".into()))?;

		let tables = self.tables.read().await;
		let mut prices: Vec<PriceObservation> = tables
			.prices
			.iter()
			.filter(|p| match &filter.location {
				Some(location) => &p.location == location,
				None => true,
			})
			.cloned()
			.collect();

		prices.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
		prices.truncate(limit);
		Ok(prices)
	}

	async fn insert_price(
		&self,
		price: &NewPriceObservation,
	) -> Result<PriceObservation, StorageError> {
		let mut tables = self.tables.write().await;

		let duplicate = tables
			.prices
			.iter()
			.any(|p| p.date == price.date && p.location == price.location);
		if duplicate {
			return Err(StorageError::Constraint(format!(
				"price for '{}' on {} already exists",
				price.location, price.date
			)));
		}

		tables.next_price_id += 1;
		let stored = PriceObservation {
			id: tables.next_price_id,
			date: price.date,
			location: price.location.clone(),
			price_per_dozen: price.price_per_dozen,
			source: price.source.clone(),
			created_at: Utc::now(),
		};
		tables.prices.push(stored.clone());
		Ok(stored)
	}

	async fn list_locations(&self) -> Result<Vec<Location>, StorageError> {
		let tables = self.tables.read().await;
		let mut locations = tables.locations.clone();
		locations.sort_by(|a, b| a.name.cmp(&b.name));
		Ok(locations)
	}

	async fn latest_prices(&self) -> Result<Vec<LatestPrice>, StorageError> {
		let tables = self.tables.read().await;

		// BTreeMap keeps the output ordered by location name
		let mut latest: BTreeMap<&str, &PriceObservation> = BTreeMap::new();
		for price in &tables.prices {
			latest
				.entry(price.location.as_str())
				.and_modify(|current| {
					if (price.date, price.id) > (current.date, current.id) {
						*current = price;
					}
				})
				.or_insert(price);
		}

		Ok(latest
			.into_values()
			.map(|p| LatestPrice {
				location: p.location.clone(),
				price_per_dozen: p.price_per_dozen,
				date: p.date,
				id: p.id,
			})
			.collect())
	}

	async fn ping(&self) -> Result<(), StorageError> {
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}

	async fn prepare(&self) -> Result<(), StorageError> {
		for location in &self.seed {
			self.register_location(&location.name, &location.location_type)
				.await;
		}
		if !self.seed.is_empty() {
			tracing::info!(locations = self.seed.len(), "Registered configured locations");
		}
		Ok(())
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// No settings, but the section must still be a table
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let seed = location_seed(config)?;
	Ok(Box::new(MemoryStorage::new().with_locations(seed)))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
