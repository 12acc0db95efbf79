use crate::server::AppState;
use axum::{extract::State, Json};
use egg_types::{APIError, HealthResponse, STORE_UNAVAILABLE};

/// Handles GET /health requests.
///
/// Any store failure is reported as 503 so load balancers take the instance out.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, APIError> {
	match state.service.health().await {
		Ok(()) => Ok(Json(HealthResponse::ok())),
		Err(e) => {
			tracing::warn!("Health check failed: {}", e);
			Err(APIError::ServiceUnavailable {
				error_type: STORE_UNAVAILABLE.to_string(),
				message: e.to_string(),
			})
		},
	}
}
