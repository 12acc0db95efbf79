//! Local versus national price comparison.

use egg_types::{LatestPrice, PriceComparison, NATIONAL_LOCATION};

/// Relative difference of `current` over `national`, in percent.
///
/// Returns zero when the national price is not positive.
pub fn percentage_difference(current: f64, national: f64) -> f64 {
	if national > 0.0 {
		(current - national) / national * 100.0
	} else {
		0.0
	}
}

/// Builds one comparison record per non-national location.
///
/// `latest` holds the most recent observation of each location. Without a
/// national observation there is no baseline and the result is empty.
/// Output is ordered by location name.
pub fn build_comparisons(latest: &[LatestPrice]) -> Vec<PriceComparison> {
	let Some(national) = latest.iter().find(|p| p.location == NATIONAL_LOCATION) else {
		return Vec::new();
	};
	let national_price = national.price_per_dozen;

	let mut comparisons: Vec<PriceComparison> = latest
		.iter()
		.filter(|p| p.location != NATIONAL_LOCATION)
		.map(|p| PriceComparison {
			location: p.location.clone(),
			current_price: p.price_per_dozen,
			national_price,
			difference: p.price_per_dozen - national_price,
			percentage: percentage_difference(p.price_per_dozen, national_price),
		})
		.collect();

	comparisons.sort_by(|a, b| a.location.cmp(&b.location));
	comparisons
}
