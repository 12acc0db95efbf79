//! HTTP server for the egg price tracker API.
//!
//! Routes live under `/api`, with `/health` at the root for load balancers.
//! Requests are traced and CORS is fully open so a browser dashboard on
//! another origin can read the data.

use crate::apis;
use axum::{routing::get, Router};
use egg_config::ApiConfig;
use egg_core::PriceService;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Price operations over the configured store.
	pub service: Arc<PriceService>,
}

/// Builds the API router over the given service.
pub fn router(service: Arc<PriceService>) -> Router {
	let app_state = AppState { service };

	Router::new()
		.nest(
			"/api",
			Router::new()
				.route(
					"/prices",
					get(apis::prices::list_prices).post(apis::prices::add_price),
				)
				.route("/locations", get(apis::locations::list_locations))
				.route("/comparison", get(apis::comparison::get_comparison)),
		)
		.route("/health", get(apis::health::health))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(app_state)
}

/// Starts the HTTP server and serves until ctrl-c.
pub async fn start_server(
	api_config: ApiConfig,
	service: Arc<PriceService>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(service);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Egg price API listening on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to listen for shutdown signal: {}", e);
		return;
	}
	tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{
		body::{to_bytes, Body},
		http::{header, Method, Request, StatusCode},
	};
	use chrono::NaiveDate;
	use egg_storage::{implementations::memory::MemoryStorage, StorageInterface};
	use egg_types::{NewPriceObservation, ValidationPolicy};
	use serde_json::{json, Value};
	use tower::ServiceExt;

	fn date(s: &str) -> NaiveDate {
		NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
	}

	async fn seeded_storage(rows: &[(&str, &str, f64)]) -> MemoryStorage {
		let storage = MemoryStorage::new();
		for (day, location, price) in rows {
			storage
				.insert_price(&NewPriceObservation::new(date(day), *location, *price, "test"))
				.await
				.unwrap();
		}
		storage
	}

	fn app_with(storage: MemoryStorage, policy: ValidationPolicy) -> Router {
		let service = PriceService::new(Box::new(storage)).with_policy(policy);
		router(Arc::new(service))
	}

	async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
		let response = app.oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let body = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, body)
	}

	fn get_request(uri: &str) -> Request<Body> {
		Request::builder().uri(uri).body(Body::empty()).unwrap()
	}

	fn post_json(uri: &str, body: &str) -> Request<Body> {
		Request::builder()
			.method(Method::POST)
			.uri(uri)
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from(body.to_string()))
			.unwrap()
	}

	#[tokio::test]
	async fn test_list_prices_empty_store_returns_empty_array() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let (status, body) = send(app, get_request("/api/prices")).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!([]));
	}

	#[tokio::test]
	async fn test_list_prices_filters_and_limits() {
		let storage = seeded_storage(&[
			("2024-01-01", "California", 4.10),
			("2024-01-02", "California", 4.20),
			("2024-01-03", "California", 4.30),
			("2024-01-03", "Texas", 3.10),
		])
		.await;
		let app = app_with(storage, ValidationPolicy::Permissive);

		let (status, body) =
			send(app, get_request("/api/prices?location=California&limit=2")).await;

		assert_eq!(status, StatusCode::OK);
		let rows = body.as_array().unwrap();
		assert_eq!(rows.len(), 2);
		assert_eq!(rows[0]["date"], "2024-01-03");
		assert_eq!(rows[1]["date"], "2024-01-02");
		assert!(rows.iter().all(|r| r["location"] == "California"));
	}

	#[tokio::test]
	async fn test_list_prices_empty_params_are_ignored() {
		let storage = seeded_storage(&[
			("2024-01-01", "California", 4.10),
			("2024-01-01", "Texas", 3.10),
		])
		.await;
		let app = app_with(storage, ValidationPolicy::Permissive);

		let (status, body) = send(app, get_request("/api/prices?location=&limit=")).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body.as_array().unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_list_prices_rejects_non_integer_limit() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let (status, body) = send(app, get_request("/api/prices?limit=abc")).await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_PARAMETER");
		assert_eq!(body["message"], "Invalid limit parameter");
	}

	#[tokio::test]
	async fn test_list_prices_rejects_negative_limit() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let (status, body) = send(app, get_request("/api/prices?limit=-1")).await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_PARAMETER");
	}

	#[tokio::test]
	async fn test_add_price_then_list_includes_it_once() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let (status, created) = send(
			app.clone(),
			post_json(
				"/api/prices",
				r#"{"date":"2024-02-01","location":"Ohio","price_per_dozen":3.49,"source":"manual"}"#,
			),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert!(created["id"].as_i64().unwrap() > 0);
		assert_eq!(created["location"], "Ohio");
		assert_eq!(created["source"], "manual");
		assert!(created["created_at"].is_string());

		let (status, body) = send(app, get_request("/api/prices?location=Ohio")).await;
		assert_eq!(status, StatusCode::OK);
		let rows = body.as_array().unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0]["id"], created["id"]);
		assert_eq!(rows[0]["price_per_dozen"], 3.49);
	}

	#[tokio::test]
	async fn test_add_price_defaults_missing_source() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let (status, created) = send(
			app,
			post_json(
				"/api/prices",
				r#"{"date":"2024-02-01","location":"Ohio","price_per_dozen":3.49}"#,
			),
		)
		.await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(created["source"], "");
	}

	#[tokio::test]
	async fn test_add_price_without_content_type() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);
		let request = Request::builder()
			.method(Method::POST)
			.uri("/api/prices")
			.body(Body::from(
				r#"{"date":"2024-02-01","location":"Ohio","price_per_dozen":3.49,"source":"collector"}"#,
			))
			.unwrap();

		let (status, created) = send(app.clone(), request).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(created["source"], "collector");

		let (_, rows) = send(app, get_request("/api/prices")).await;
		assert_eq!(rows.as_array().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_add_price_rejects_missing_field() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let (status, body) = send(
			app,
			post_json("/api/prices", r#"{"date":"2024-02-01","location":"Ohio"}"#),
		)
		.await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_PAYLOAD");
	}

	#[tokio::test]
	async fn test_list_prices_repeated_limit_uses_first() {
		let storage = seeded_storage(&[
			("2024-01-01", "California", 4.10),
			("2024-01-02", "California", 4.20),
			("2024-01-03", "California", 4.30),
		])
		.await;
		let app = app_with(storage, ValidationPolicy::Permissive);

		let (status, body) = send(app, get_request("/api/prices?limit=1&limit=3")).await;

		assert_eq!(status, StatusCode::OK);
		let rows = body.as_array().unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0]["date"], "2024-01-03");
	}

	#[tokio::test]
	async fn test_add_price_rejects_malformed_json() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let (status, body) = send(app, post_json("/api/prices", "{not json")).await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_PAYLOAD");
	}

	#[tokio::test]
	async fn test_add_price_rejects_bad_date() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let (status, body) = send(
			app,
			post_json(
				"/api/prices",
				r#"{"date":"01/02/2024","location":"Ohio","price_per_dozen":3.49}"#,
			),
		)
		.await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_PAYLOAD");
	}

	#[tokio::test]
	async fn test_add_price_permissive_accepts_zero_price() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let (status, _) = send(
			app,
			post_json(
				"/api/prices",
				r#"{"date":"2024-02-01","location":"Ohio","price_per_dozen":0}"#,
			),
		)
		.await;

		assert_eq!(status, StatusCode::OK);
	}

	#[tokio::test]
	async fn test_add_price_strict_rejects_zero_price() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Strict);

		let (status, body) = send(
			app.clone(),
			post_json(
				"/api/prices",
				r#"{"date":"2024-02-01","location":"Ohio","price_per_dozen":0}"#,
			),
		)
		.await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "VALIDATION_ERROR");
		assert!(body["details"]["price_per_dozen"].is_array());

		let (_, rows) = send(app, get_request("/api/prices")).await;
		assert_eq!(rows, json!([]));
	}

	#[tokio::test]
	async fn test_add_price_duplicate_is_store_error() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);
		let payload = r#"{"date":"2024-02-01","location":"Ohio","price_per_dozen":3.49}"#;

		let (status, _) = send(app.clone(), post_json("/api/prices", payload)).await;
		assert_eq!(status, StatusCode::OK);

		let (status, body) = send(app, post_json("/api/prices", payload)).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body["error"], "STORE_ERROR");
	}

	#[tokio::test]
	async fn test_locations_sorted_by_name() {
		let storage = MemoryStorage::new();
		storage.register_location("Texas", "state").await;
		storage.register_location("NATIONAL", "national").await;
		storage.register_location("California", "state").await;
		let app = app_with(storage, ValidationPolicy::Permissive);

		let (status, body) = send(app, get_request("/api/locations")).await;

		assert_eq!(status, StatusCode::OK);
		let names: Vec<&str> = body
			.as_array()
			.unwrap()
			.iter()
			.map(|l| l["name"].as_str().unwrap())
			.collect();
		assert_eq!(names, vec!["California", "NATIONAL", "Texas"]);
		assert_eq!(body[0]["type"], "state");
	}

	#[tokio::test]
	async fn test_comparison_against_national() {
		let storage = seeded_storage(&[
			("2024-01-01", "NATIONAL", 3.50),
			("2024-01-02", "NATIONAL", 4.00),
			("2024-01-01", "California", 4.50),
			("2024-01-02", "California", 5.00),
		])
		.await;
		let app = app_with(storage, ValidationPolicy::Permissive);

		let (status, body) = send(app, get_request("/api/comparison")).await;

		assert_eq!(status, StatusCode::OK);
		let rows = body.as_array().unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0]["location"], "California");
		assert_eq!(rows[0]["current_price"], 5.0);
		assert_eq!(rows[0]["national_price"], 4.0);
		assert_eq!(rows[0]["difference"], 1.0);
		assert_eq!(rows[0]["percentage"], 25.0);
	}

	#[tokio::test]
	async fn test_comparison_without_national_is_empty() {
		let storage = seeded_storage(&[("2024-01-01", "California", 4.50)]).await;
		let app = app_with(storage, ValidationPolicy::Permissive);

		let (status, body) = send(app, get_request("/api/comparison")).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!([]));
	}

	#[tokio::test]
	async fn test_health_ok() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let (status, body) = send(app, get_request("/health")).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"status": "ok"}));
	}

	#[tokio::test]
	async fn test_unknown_route_is_not_found() {
		let app = app_with(MemoryStorage::new(), ValidationPolicy::Permissive);

		let response = app.oneshot(get_request("/api/unknown")).await.unwrap();

		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}
}
