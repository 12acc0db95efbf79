//! Local versus national comparison endpoint.

use crate::server::AppState;
use axum::{extract::State, Json};
use egg_types::{APIError, PriceComparison};

/// Handles GET /api/comparison requests.
///
/// Responds with an empty array when no national price has been recorded.
pub async fn get_comparison(
	State(state): State<AppState>,
) -> Result<Json<Vec<PriceComparison>>, APIError> {
	state.service.comparisons().await.map(Json).map_err(|e| {
		tracing::warn!("Comparison failed: {}", e);
		APIError::from(e)
	})
}
