//! Price listing and insertion endpoints.
//!
//! `GET /api/prices` returns observations newest first, optionally filtered
//! by exact location and capped by `limit` (default from configuration).
//! `POST /api/prices` stores one observation and echoes it back with its id.

use crate::server::AppState;
use axum::{
	body::Bytes,
	extract::{rejection::QueryRejection, Query, State},
	Json,
};
use egg_types::{APIError, NewPriceObservation, PriceObservation, INVALID_PARAMETER, INVALID_PAYLOAD};
use tracing::warn;

/// Raw query parameters of `GET /api/prices`.
///
/// Values stay strings so a malformed limit becomes a clear 400. When a
/// parameter is repeated the first occurrence wins.
#[derive(Debug, Default, PartialEq)]
pub struct PriceQuery {
	pub location: Option<String>,
	pub limit: Option<String>,
}

impl PriceQuery {
	fn from_pairs(pairs: Vec<(String, String)>) -> Self {
		let mut query = Self::default();
		for (key, value) in pairs {
			let slot = match key.as_str() {
				"location" => &mut query.location,
				"limit" => &mut query.limit,
				_ => continue,
			};
			slot.get_or_insert(value);
		}
		query
	}
}

/// Handles GET /api/prices requests.
pub async fn list_prices(
	State(state): State<AppState>,
	query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<PriceObservation>>, APIError> {
	let Query(pairs) = query.map_err(|e| {
		warn!("Rejected price query: {}", e.body_text());
		APIError::bad_request(INVALID_PARAMETER, e.body_text())
	})?;
	let query = PriceQuery::from_pairs(pairs);

	match state
		.service
		.list_prices(query.location.as_deref(), query.limit.as_deref())
		.await
	{
		Ok(prices) => Ok(Json(prices)),
		Err(e) => {
			warn!("Price listing failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles POST /api/prices requests.
///
/// The body is decoded as JSON whatever `Content-Type` the client sends.
pub async fn add_price(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<PriceObservation>, APIError> {
	let price: NewPriceObservation = serde_json::from_slice(&body).map_err(|e| {
		warn!("Rejected price payload: {}", e);
		APIError::bad_request(INVALID_PAYLOAD, format!("Invalid price payload: {}", e))
	})?;

	match state.service.add_price(price).await {
		Ok(stored) => Ok(Json(stored)),
		Err(e) => {
			warn!("Price insertion failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
		items
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[test]
	fn test_query_first_value_wins() {
		let query = PriceQuery::from_pairs(pairs(&[
			("limit", "5"),
			("location", "Texas"),
			("limit", "6"),
			("location", "Ohio"),
		]));
		assert_eq!(query.limit.as_deref(), Some("5"));
		assert_eq!(query.location.as_deref(), Some("Texas"));
	}

	#[test]
	fn test_query_ignores_unknown_parameters() {
		let query = PriceQuery::from_pairs(pairs(&[("page", "2")]));
		assert_eq!(query, PriceQuery::default());
	}
}
