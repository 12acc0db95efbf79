//! PostgreSQL storage backend.
//!
//! Prices live in `egg_prices` and locations in `locations`. The pool is
//! created lazily, so building the backend never blocks on the database;
//! each query acquires a pooled connection and releases it when done.
//!
//! Configuration parameters:
//! - `database_url` (required): PostgreSQL connection URL
//! - `max_connections` (optional, default 10)
//! - `min_connections` (optional, default 1)
//! - `acquire_timeout_seconds` (optional, default 5)
//! - `run_migrations` (optional, default false): create missing tables on startup
//! - `locations` (optional): `[{ name, type }, ...]` inserted on startup if absent

use crate::{location_seed, StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use egg_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, LatestPrice, Location,
	LocationSeed, NewPriceObservation, PriceFilter, PriceObservation, Schema, ValidationError,
};
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

/// Statements run by [`StorageInterface::prepare`] when migrations are enabled.
const MIGRATIONS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS locations (
		id SERIAL PRIMARY KEY,
		name VARCHAR(100) UNIQUE NOT NULL,
		type VARCHAR(50) NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS egg_prices (
		id SERIAL PRIMARY KEY,
		date DATE NOT NULL,
		location VARCHAR(100) NOT NULL,
		price_per_dozen DOUBLE PRECISION NOT NULL,
		source VARCHAR(255) NOT NULL DEFAULT '',
		created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
		UNIQUE (date, location)
	)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_egg_prices_location_date
		ON egg_prices (location, date DESC)
	"#,
];

const LIST_PRICES_SQL: &str = r#"
	SELECT id, date, location, price_per_dozen,
	       COALESCE(source, '') AS source, created_at::timestamptz AS created_at
	FROM egg_prices
	WHERE ($1::text IS NULL OR location = $1)
	ORDER BY date DESC, id DESC
	LIMIT $2
"#;

const INSERT_PRICE_SQL: &str = r#"
	INSERT INTO egg_prices (date, location, price_per_dozen, source)
	VALUES ($1, $2, $3, $4)
	RETURNING id, date, location, price_per_dozen,
	          COALESCE(source, '') AS source, created_at::timestamptz AS created_at
"#;

const LIST_LOCATIONS_SQL: &str = "SELECT id, name, type FROM locations ORDER BY name";

const INSERT_LOCATION_SQL: &str =
	"INSERT INTO locations (name, type) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING";

const LATEST_PRICES_SQL: &str = r#"
	SELECT DISTINCT ON (location)
	       id, location, price_per_dozen, date
	FROM egg_prices
	ORDER BY location, date DESC, id DESC
"#;

#[derive(Debug, sqlx::FromRow)]
struct PriceRow {
	id: i32,
	date: NaiveDate,
	location: String,
	price_per_dozen: f64,
	source: String,
	created_at: DateTime<Utc>,
}

impl From<PriceRow> for PriceObservation {
	fn from(row: PriceRow) -> Self {
		PriceObservation {
			id: row.id,
			date: row.date,
			location: row.location,
			price_per_dozen: row.price_per_dozen,
			source: row.source,
			created_at: row.created_at,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
struct LocationRow {
	id: i32,
	name: String,
	#[sqlx(rename = "type")]
	location_type: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LatestPriceRow {
	id: i32,
	location: String,
	price_per_dozen: f64,
	date: NaiveDate,
}

/// Maps driver errors onto the storage taxonomy.
fn map_sqlx_error(err: sqlx::Error) -> StorageError {
	match err {
		sqlx::Error::Database(db_err) => match db_err.kind() {
			ErrorKind::UniqueViolation
			| ErrorKind::ForeignKeyViolation
			| ErrorKind::NotNullViolation
			| ErrorKind::CheckViolation => StorageError::Constraint(db_err.to_string()),
			_ => StorageError::Backend(db_err.to_string()),
		},
		sqlx::Error::Io(e) => StorageError::Connection(e.to_string()),
		sqlx::Error::Tls(e) => StorageError::Connection(e.to_string()),
		sqlx::Error::PoolTimedOut => {
			StorageError::Connection("timed out acquiring a connection".into())
		},
		sqlx::Error::PoolClosed => StorageError::Connection("connection pool closed".into()),
		other => StorageError::Backend(other.to_string()),
	}
}

/// Pool settings read from the backend's TOML table.
#[derive(Debug, Clone, PartialEq)]
pub struct PostgresSettings {
	pub database_url: String,
	pub max_connections: u32,
	pub min_connections: u32,
	pub acquire_timeout: Duration,
	pub run_migrations: bool,
	pub locations: Vec<LocationSeed>,
}

impl PostgresSettings {
	/// Reads settings from an already validated configuration table.
	fn from_config(config: &toml::Value) -> Result<Self, StorageError> {
		let database_url = config
			.get("database_url")
			.and_then(|v| v.as_str())
			.ok_or_else(|| StorageError::Configuration("database_url is required".into()))?
			.to_string();

		let int = |key: &str, default: i64| {
			config
				.get(key)
				.and_then(|v| v.as_integer())
				.unwrap_or(default)
		};
		let out_of_range = |key: &str, value: i64| {
			StorageError::Configuration(format!("{} out of range: {}", key, value))
		};

		let max_connections = int("max_connections", 10);
		let min_connections = int("min_connections", 1);
		let acquire_timeout = int("acquire_timeout_seconds", 5);

		Ok(Self {
			database_url,
			max_connections: u32::try_from(max_connections)
				.map_err(|_| out_of_range("max_connections", max_connections))?,
			min_connections: u32::try_from(min_connections)
				.map_err(|_| out_of_range("min_connections", min_connections))?,
			acquire_timeout: Duration::from_secs(
				u64::try_from(acquire_timeout)
					.map_err(|_| out_of_range("acquire_timeout_seconds", acquire_timeout))?,
			),
			run_migrations: config
				.get("run_migrations")
				.and_then(|v| v.as_bool())
				.unwrap_or(false),
			locations: location_seed(config)?,
		})
	}
}

/// PostgreSQL storage implementation.
pub struct PostgresStorage {
	pool: PgPool,
	run_migrations: bool,
	locations: Vec<LocationSeed>,
}

impl PostgresStorage {
	/// Creates a backend over an existing pool.
	pub fn new(pool: PgPool, run_migrations: bool) -> Self {
		Self {
			pool,
			run_migrations,
			locations: Vec::new(),
		}
	}

	/// Sets the locations inserted by [`StorageInterface::prepare`].
	pub fn with_locations(mut self, locations: Vec<LocationSeed>) -> Self {
		self.locations = locations;
		self
	}

	/// Builds a lazily connecting pool from settings.
	///
	/// Must be called from within a Tokio runtime.
	pub fn connect_lazy(settings: &PostgresSettings) -> Result<Self, StorageError> {
		let options = PgConnectOptions::from_str(&settings.database_url)
			.map_err(|e| StorageError::Configuration(format!("invalid database_url: {}", e)))?;

		let pool = PgPoolOptions::new()
			.max_connections(settings.max_connections)
			.min_connections(settings.min_connections)
			.acquire_timeout(settings.acquire_timeout)
			.connect_lazy_with(options);

		tracing::info!(
			max_connections = settings.max_connections,
			min_connections = settings.min_connections,
			acquire_timeout_secs = settings.acquire_timeout.as_secs(),
			"Database pool created"
		);

		Ok(Self::new(pool, settings.run_migrations).with_locations(settings.locations.clone()))
	}
}

#[async_trait]
impl StorageInterface for PostgresStorage {
	async fn list_prices(
		&self,
		filter: &PriceFilter,
	) -> Result<Vec<PriceObservation>, StorageError> {
		let rows = sqlx::query_as::<_, PriceRow>(LIST_PRICES_SQL)
			.bind(filter.location.as_deref())
			.bind(filter.limit)
			.fetch_all(&self.pool)
			.await
			.map_err(map_sqlx_error)?;

		Ok(rows.into_iter().map(PriceObservation::from).collect())
	}

	async fn insert_price(
		&self,
		price: &NewPriceObservation,
	) -> Result<PriceObservation, StorageError> {
		let row = sqlx::query_as::<_, PriceRow>(INSERT_PRICE_SQL)
			.bind(price.date)
			.bind(&price.location)
			.bind(price.price_per_dozen)
			.bind(&price.source)
			.fetch_one(&self.pool)
			.await
			.map_err(map_sqlx_error)?;

		tracing::debug!(id = row.id, location = %row.location, date = %row.date, "Inserted price");
		Ok(row.into())
	}

	async fn list_locations(&self) -> Result<Vec<Location>, StorageError> {
		let rows = sqlx::query_as::<_, LocationRow>(LIST_LOCATIONS_SQL)
			.fetch_all(&self.pool)
			.await
			.map_err(map_sqlx_error)?;

		Ok(rows
			.into_iter()
			.map(|row| Location {
				id: row.id,
				name: row.name,
				location_type: row.location_type,
			})
			.collect())
	}

	async fn latest_prices(&self) -> Result<Vec<LatestPrice>, StorageError> {
		let rows = sqlx::query_as::<_, LatestPriceRow>(LATEST_PRICES_SQL)
			.fetch_all(&self.pool)
			.await
			.map_err(map_sqlx_error)?;

		Ok(rows
			.into_iter()
			.map(|row| LatestPrice {
				location: row.location,
				price_per_dozen: row.price_per_dozen,
				date: row.date,
				id: row.id,
			})
			.collect())
	}

	async fn ping(&self) -> Result<(), StorageError> {
		sqlx::query("SELECT 1")
			.execute(&self.pool)
			.await
			.map_err(map_sqlx_error)?;
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(PostgresStorageSchema)
	}

	async fn prepare(&self) -> Result<(), StorageError> {
		if self.run_migrations {
			for statement in MIGRATIONS {
				sqlx::query(statement)
					.execute(&self.pool)
					.await
					.map_err(map_sqlx_error)?;
			}
			tracing::info!(statements = MIGRATIONS.len(), "Applied migrations");
		} else {
			tracing::debug!("Skipping migrations");
		}

		let mut inserted = 0;
		for location in &self.locations {
			let result = sqlx::query(INSERT_LOCATION_SQL)
				.bind(&location.name)
				.bind(&location.location_type)
				.execute(&self.pool)
				.await
				.map_err(map_sqlx_error)?;
			inserted += result.rows_affected();
		}
		if !self.locations.is_empty() {
			tracing::info!(
				configured = self.locations.len(),
				inserted,
				"Ensured configured locations"
			);
		}

		Ok(())
	}
}

/// Configuration schema for PostgresStorage.
pub struct PostgresStorageSchema;

impl ConfigSchema for PostgresStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let pool_size = || FieldType::Integer {
			min: Some(1),
			max: Some(100),
		};

		let schema = Schema::new(
			vec![
				Field::new("database_url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url)
							if url.starts_with("postgres://")
								|| url.starts_with("postgresql://") =>
						{
							Ok(())
						},
						_ => Err("must start with postgres:// or postgresql://".into()),
					}
				}),
			],
			vec![
				Field::new("max_connections", pool_size()),
				Field::new(
					"min_connections",
					FieldType::Integer {
						min: Some(0),
						max: Some(100),
					},
				),
				Field::new(
					"acquire_timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
				Field::new("run_migrations", FieldType::Boolean),
			],
		);

		schema.validate(config)?;

		let max = config.get("max_connections").and_then(|v| v.as_integer());
		let min = config.get("min_connections").and_then(|v| v.as_integer());
		if let (Some(max), Some(min)) = (max, min) {
			if min > max {
				return Err(ValidationError::InvalidValue {
					field: "min_connections".into(),
					message: format!("{} exceeds max_connections {}", min, max),
				});
			}
		}

		Ok(())
	}
}

/// Factory function to create a PostgreSQL storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	PostgresStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let settings = PostgresSettings::from_config(config)?;
	Ok(Box::new(PostgresStorage::connect_lazy(&settings)?))
}

/// Registry for the PostgreSQL storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "postgres";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
