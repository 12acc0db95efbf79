//! Location registry endpoint.

use crate::server::AppState;
use axum::{extract::State, Json};
use egg_types::{APIError, Location};

/// Handles GET /api/locations requests.
///
/// Returns every registered location ordered by name.
pub async fn list_locations(
	State(state): State<AppState>,
) -> Result<Json<Vec<Location>>, APIError> {
	state.service.locations().await.map(Json).map_err(|e| {
		tracing::warn!("Location listing failed: {}", e);
		APIError::from(e)
	})
}
