//! Query service for the egg price tracker.
//!
//! [`PriceService`] sits between the HTTP handlers and the configured
//! storage backend. It parses listing parameters, applies the insert
//! validation policy and derives comparison records from the latest prices.
//! The backend is injected, so tests run the same logic over the in-memory
//! store.

use egg_storage::{StorageError, StorageInterface};
use egg_types::{
	APIError, Location, NewPriceObservation, PriceComparison, PriceFilter, PriceObservation,
	ValidationPolicy, DEFAULT_PRICE_LIMIT,
};
use thiserror::Error;
use validator::Validate;

pub mod builder;
pub mod comparison;

pub use builder::{BuilderError, PriceServiceBuilder};

/// Errors returned by [`PriceService`] operations.
#[derive(Debug, Error)]
pub enum PriceServiceError {
	/// A query parameter could not be interpreted.
	#[error("Invalid {name} parameter")]
	InvalidParameter { name: &'static str, value: String },
	/// The payload was rejected by the strict validation policy.
	#[error("Validation failed: {0}")]
	Validation(#[from] validator::ValidationErrors),
	/// The store failed to execute the operation.
	#[error(transparent)]
	Storage(#[from] StorageError),
}

impl From<PriceServiceError> for APIError {
	fn from(err: PriceServiceError) -> Self {
		match err {
			PriceServiceError::InvalidParameter { .. } => {
				APIError::bad_request(egg_types::INVALID_PARAMETER, err.to_string())
			},
			PriceServiceError::Validation(ref errors) => APIError::BadRequest {
				error_type: egg_types::VALIDATION_ERROR.to_string(),
				message: "Price payload failed validation".to_string(),
				details: serde_json::to_value(errors).ok(),
			},
			PriceServiceError::Storage(StorageError::Connection(message)) => {
				APIError::ServiceUnavailable {
					error_type: egg_types::STORE_UNAVAILABLE.to_string(),
					message,
				}
			},
			PriceServiceError::Storage(e) => APIError::InternalServerError {
				error_type: egg_types::STORE_ERROR.to_string(),
				message: e.to_string(),
			},
		}
	}
}

/// Price listing, insertion, location and comparison operations over a store.
pub struct PriceService {
	storage: Box<dyn StorageInterface>,
	policy: ValidationPolicy,
	default_limit: i64,
}

impl PriceService {
	/// Creates a permissive service with the standard default limit.
	pub fn new(storage: Box<dyn StorageInterface>) -> Self {
		Self {
			storage,
			policy: ValidationPolicy::default(),
			default_limit: DEFAULT_PRICE_LIMIT,
		}
	}

	pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn with_default_limit(mut self, default_limit: i64) -> Self {
		self.default_limit = default_limit;
		self
	}

	pub fn policy(&self) -> ValidationPolicy {
		self.policy
	}

	/// Turns raw query parameters into a listing filter.
	///
	/// Empty values count as absent. The limit must be a non-negative integer.
	pub fn parse_filter(
		&self,
		location: Option<&str>,
		limit: Option<&str>,
	) -> Result<PriceFilter, PriceServiceError> {
		let location = location.filter(|l| !l.is_empty()).map(str::to_string);

		let limit = match limit.filter(|l| !l.is_empty()) {
			None => self.default_limit,
			Some(raw) => match raw.parse::<i64>() {
				Ok(n) if n >= 0 => n,
				_ => {
					return Err(PriceServiceError::InvalidParameter {
						name: "limit",
						value: raw.to_string(),
					});
				},
			},
		};

		Ok(PriceFilter { location, limit })
	}

	/// Lists observations, newest first, capped at the limit.
	pub async fn list_prices(
		&self,
		location: Option<&str>,
		limit: Option<&str>,
	) -> Result<Vec<PriceObservation>, PriceServiceError> {
		let filter = self.parse_filter(location, limit)?;
		tracing::debug!(location = ?filter.location, limit = filter.limit, "Listing prices");
		Ok(self.storage.list_prices(&filter).await?)
	}

	/// Stores a new observation, checking it first under the strict policy.
	pub async fn add_price(
		&self,
		price: NewPriceObservation,
	) -> Result<PriceObservation, PriceServiceError> {
		if self.policy == ValidationPolicy::Strict {
			price.validate()?;
		}

		let stored = self.storage.insert_price(&price).await?;
		tracing::info!(
			id = stored.id,
			location = %stored.location,
			date = %stored.date,
			price = stored.price_per_dozen,
			"Recorded price"
		);
		Ok(stored)
	}

	/// Lists all registered locations by name.
	pub async fn locations(&self) -> Result<Vec<Location>, PriceServiceError> {
		Ok(self.storage.list_locations().await?)
	}

	/// Compares every location's latest price with the latest national price.
	pub async fn comparisons(&self) -> Result<Vec<PriceComparison>, PriceServiceError> {
		let latest = self.storage.latest_prices().await?;
		let comparisons = comparison::build_comparisons(&latest);
		if comparisons.is_empty() && !latest.is_empty() {
			tracing::debug!("No national baseline available for comparison");
		}
		Ok(comparisons)
	}

	/// Checks that the store is reachable.
	pub async fn health(&self) -> Result<(), PriceServiceError> {
		Ok(self.storage.ping().await?)
	}
}
