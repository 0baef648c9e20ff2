use serde::{Deserialize, Serialize};

use crate::models::Listing;

/// Display-side narrowing of the listing set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilter {
    /// Matched against name, location and description
    pub search: String,
    /// Every amenity must appear within some comfort feature
    pub amenities: Vec<String>,
    pub max_proximity: u32,
    pub min_capacity: u32,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            amenities: Vec::new(),
            max_proximity: 120,
            min_capacity: 8,
        }
    }
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        let search = self.search.to_lowercase();
        let matches_search = listing.name.to_lowercase().contains(&search)
            || listing.location.to_lowercase().contains(&search)
            || listing.description.to_lowercase().contains(&search);

        let matches_amenities = self.amenities.iter().all(|amenity| {
            let amenity = amenity.to_lowercase();
            listing
                .comfort_features
                .iter()
                .any(|f| f.to_lowercase().contains(&amenity))
        });

        matches_search
            && listing.proximity_to_caba <= self.max_proximity
            && listing.capacity >= self.min_capacity
            && matches_amenities
    }
}

/// Listings passing the filter, best score first
pub fn filter_and_sort<'a>(listings: &'a [Listing], filter: &ListingFilter) -> Vec<&'a Listing> {
    let mut out: Vec<&Listing> = listings.iter().filter(|l| filter.matches(l)).collect();
    out.sort_by(|a, b| b.score.cmp(&a.score));
    out
}
