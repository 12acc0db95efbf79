//! Price tracking records.
//!
//! A [`PriceObservation`] is one recorded price per dozen for a location on a
//! given date. Observations are immutable once stored. The location named
//! [`NATIONAL_LOCATION`] carries the nationwide baseline that every other
//! location is compared against.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Location name of the nationwide baseline.
pub const NATIONAL_LOCATION: &str = "NATIONAL";

/// Number of observations returned by a listing when no limit is given.
pub const DEFAULT_PRICE_LIMIT: i64 = 30;

/// A stored price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
	/// Store-generated identifier.
	pub id: i32,
	/// Calendar date the price was observed for.
	pub date: NaiveDate,
	/// Location name, loosely referencing [`Location::name`].
	pub location: String,
	/// Price of a dozen eggs in currency units.
	pub price_per_dozen: f64,
	/// Free-text origin of the data point.
	pub source: String,
	/// Server-assigned insertion time.
	pub created_at: DateTime<Utc>,
}

/// A candidate observation submitted for insertion.
///
/// The validation rules only apply under [`ValidationPolicy::Strict`]; the
/// permissive policy stores the payload exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewPriceObservation {
	pub date: NaiveDate,
	#[validate(length(min = 1, max = 100, message = "location must be 1-100 characters"))]
	pub location: String,
	#[validate(range(exclusive_min = 0.0, message = "price_per_dozen must be positive"))]
	pub price_per_dozen: f64,
	#[serde(default)]
	#[validate(length(max = 255, message = "source must be at most 255 characters"))]
	pub source: String,
}

impl NewPriceObservation {
	/// Convenience constructor used by seeding code and tests.
	pub fn new(
		date: NaiveDate,
		location: impl Into<String>,
		price_per_dozen: f64,
		source: impl Into<String>,
	) -> Self {
		Self {
			date,
			location: location.into(),
			price_per_dozen,
			source: source.into(),
		}
	}
}

/// A registered location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
	pub id: i32,
	pub name: String,
	/// Kind tag such as "national" or "state".
	#[serde(rename = "type")]
	pub location_type: String,
}

/// A location to register when a store is prepared.
///
/// Read from the `locations` array of a storage backend's configuration table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSeed {
	pub name: String,
	#[serde(rename = "type")]
	pub location_type: String,
}

/// The most recent observation for one location.
///
/// Produced by the store: maximum date wins, ties go to the highest id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPrice {
	pub location: String,
	pub price_per_dozen: f64,
	pub date: NaiveDate,
	pub id: i32,
}

/// A location's latest price contrasted with the latest national price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceComparison {
	pub location: String,
	pub current_price: f64,
	pub national_price: f64,
	pub difference: f64,
	/// Relative difference in percent; zero when the national price is not positive.
	pub percentage: f64,
}

/// Filter applied when listing observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFilter {
	/// Exact location match, or all locations when `None`.
	pub location: Option<String>,
	/// Maximum number of rows to return.
	pub limit: i64,
}

impl Default for PriceFilter {
	fn default() -> Self {
		Self {
			location: None,
			limit: DEFAULT_PRICE_LIMIT,
		}
	}
}

/// How strictly insert payloads are checked before they reach the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
	/// Store whatever parses.
	#[default]
	Permissive,
	/// Reject empty locations, oversized strings and non-positive prices.
	Strict,
}

impl fmt::Display for ValidationPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ValidationPolicy::Permissive => write!(f, "permissive"),
			ValidationPolicy::Strict => write!(f, "strict"),
		}
	}
}

impl FromStr for ValidationPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"permissive" => Ok(Self::Permissive),
			"strict" => Ok(Self::Strict),
			other => Err(format!("unknown validation policy '{}'", other)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn date(s: &str) -> NaiveDate {
		NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
	}

	#[test]
	fn test_new_price_deserializes_without_source() {
		let payload = json!({
			"date": "2024-01-15",
			"location": "Texas",
			"price_per_dozen": 2.1
		});

		let price: NewPriceObservation = serde_json::from_value(payload).unwrap();
		assert_eq!(price.date, date("2024-01-15"));
		assert_eq!(price.source, "");
	}

	#[test]
	fn test_new_price_rejects_malformed_date() {
		let payload = json!({
			"date": "15/01/2024",
			"location": "Texas",
			"price_per_dozen": 2.1,
			"source": "seed"
		});

		assert!(serde_json::from_value::<NewPriceObservation>(payload).is_err());
	}

	#[test]
	fn test_strict_rules() {
		let ok = NewPriceObservation::new(date("2024-01-15"), "Texas", 2.1, "seed");
		assert!(ok.validate().is_ok());

		let zero = NewPriceObservation::new(date("2024-01-15"), "Texas", 0.0, "seed");
		let errors = zero.validate().unwrap_err();
		assert!(errors.field_errors().contains_key("price_per_dozen"));

		let empty = NewPriceObservation::new(date("2024-01-15"), "", 2.1, "seed");
		let errors = empty.validate().unwrap_err();
		assert!(errors.field_errors().contains_key("location"));
	}

	#[test]
	fn test_location_type_field_name() {
		let location = Location {
			id: 1,
			name: "California".into(),
			location_type: "state".into(),
		};

		let value = serde_json::to_value(&location).unwrap();
		assert_eq!(value["type"], "state");
		assert!(value.get("location_type").is_none());
	}

	#[test]
	fn test_observation_serializes_date_as_plain_string() {
		let observation = PriceObservation {
			id: 7,
			date: date("2024-01-15"),
			location: "NATIONAL".into(),
			price_per_dozen: 2.0,
			source: "seed".into(),
			created_at: DateTime::parse_from_rfc3339("2024-01-15T08:00:00Z")
				.unwrap()
				.with_timezone(&Utc),
		};

		let value = serde_json::to_value(&observation).unwrap();
		assert_eq!(value["date"], "2024-01-15");
		assert_eq!(value["id"], 7);
	}

	#[test]
	fn test_validation_policy_parsing() {
		assert_eq!(
			"strict".parse::<ValidationPolicy>().unwrap(),
			ValidationPolicy::Strict
		);
		assert_eq!(ValidationPolicy::default(), ValidationPolicy::Permissive);
		assert!("lenient".parse::<ValidationPolicy>().is_err());
	}
}
