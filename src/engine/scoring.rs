use tracing::debug;

use crate::models::{FactorScores, Listing, Weights};

/// Score every listing against the maxima of the batch it belongs to.
///
/// Cheaper, better equipped and closer listings score higher. Factor scores are
/// unweighted and lie in 0..=100 for non-negative inputs; the total is the
/// weighted sum and may exceed 100 when the weights do.
pub fn score(listings: Vec<Listing>, weights: &Weights) -> Vec<Listing> {
    if listings.is_empty() {
        return listings;
    }

    let max_price = listings
        .iter()
        .map(|l| l.price)
        .fold(1.0_f64, f64::max);
    let max_comfort = listings
        .iter()
        .map(|l| l.comfort_features.len())
        .max()
        .unwrap_or(0)
        .max(1) as f64;
    let max_proximity = listings
        .iter()
        .map(|l| l.proximity_to_caba)
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    debug!(
        count = listings.len(),
        max_price, max_comfort, max_proximity, "scoring listing batch"
    );

    listings
        .into_iter()
        .map(|mut listing| {
            let price = (1.0 - listing.price / max_price) * 100.0;
            let comfort = (listing.comfort_features.len() as f64 / max_comfort) * 100.0;
            let proximity = (1.0 - listing.proximity_to_caba as f64 / max_proximity) * 100.0;

            let total = price * weights.price / 100.0
                + comfort * weights.comfort / 100.0
                + proximity * weights.proximity / 100.0;

            listing.score = total.round() as i32;
            listing.scores = FactorScores {
                price: price.round() as i32,
                comfort: comfort.round() as i32,
                proximity: proximity.round() as i32,
            };
            listing
        })
        .collect()
}
