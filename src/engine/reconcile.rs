use tracing::debug;
use uuid::Uuid;

use crate::models::{CandidateRecord, Listing};

/// A listing whose price changed during a reconciliation pass
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub listing: Listing,
    pub previous_price: f64,
}

/// Why a candidate contributed nothing to the listing set
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Shares a source url with this listing and carries the same price
    UnchangedPrice { listing_id: String },
    /// No source overlap, but name and location match this listing
    DuplicateByName { listing_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub name: String,
    pub reason: SkipReason,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Existing listings (in their original order) followed by newly added ones
    pub listings: Vec<Listing>,
    pub added: Vec<Listing>,
    pub updated: Vec<PriceUpdate>,
    pub skipped: Vec<Skipped>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty()
    }
}

/// Merge a batch of candidates into the existing listing set.
///
/// Every existing listing loses its `is_new` flag first. Candidates are then
/// classified in input order:
/// - a candidate sharing a source url with a listing is matched to the first
///   such listing; it is merged only when the price differs
/// - otherwise, a candidate whose name and location (case-insensitive) equal a
///   listing already in the working set is dropped
/// - otherwise, it becomes a new listing
pub fn reconcile(existing: Vec<Listing>, candidates: Vec<CandidateRecord>) -> Reconciliation {
    let mut listings = clear_new_flags(existing);
    let existing_len = listings.len();
    let mut updated: Vec<PriceUpdate> = Vec::new();
    let mut skipped = Vec::new();

    for candidate in candidates {
        if let Some(index) = listings
            .iter()
            .position(|l| l.shares_source_with(&candidate.sources))
        {
            let matched = &mut listings[index];

            if matched.price == candidate.price {
                debug!(listing = %matched.id, "source match with unchanged price, ignoring");
                skipped.push(Skipped {
                    name: candidate.name,
                    reason: SkipReason::UnchangedPrice {
                        listing_id: matched.id.clone(),
                    },
                });
                continue;
            }

            let previous_price = matched.price;
            matched.merge_candidate(candidate);
            matched.is_new = true;
            debug!(
                listing = %matched.id,
                previous_price,
                price = matched.price,
                "price changed, merged candidate"
            );

            // A listing can be re-priced twice in one batch; report only the latest state
            // but keep the price it had before the pass.
            match updated.iter_mut().find(|u| u.listing.id == matched.id) {
                Some(existing_update) => existing_update.listing = matched.clone(),
                None => updated.push(PriceUpdate {
                    listing: matched.clone(),
                    previous_price,
                }),
            }
            continue;
        }

        if let Some(duplicate) = listings
            .iter()
            .find(|l| l.same_name_and_location(&candidate.name, &candidate.location))
        {
            debug!(listing = %duplicate.id, name = %candidate.name, "duplicate by name and location, dropping");
            skipped.push(Skipped {
                name: candidate.name,
                reason: SkipReason::DuplicateByName {
                    listing_id: duplicate.id.clone(),
                },
            });
            continue;
        }

        let listing = Listing::from_candidate(new_listing_id(), candidate);
        debug!(listing = %listing.id, name = %listing.name, "new listing");
        listings.push(listing);
    }

    // A listing added earlier in this batch may itself have been re-priced by a
    // later candidate; it is still reported as added, not updated.
    let added_ids: Vec<String> = listings[existing_len..].iter().map(|l| l.id.clone()).collect();
    updated.retain(|u| !added_ids.contains(&u.listing.id));
    let added = listings[existing_len..].to_vec();

    Reconciliation {
        listings,
        added,
        updated,
        skipped,
    }
}

/// Add a manually entered listing, bypassing every match rule.
pub fn insert_manual(existing: Vec<Listing>, candidate: CandidateRecord) -> (Vec<Listing>, Listing) {
    let mut listings = clear_new_flags(existing);
    let listing = Listing::from_candidate(new_listing_id(), candidate);
    listings.push(listing.clone());
    (listings, listing)
}

fn clear_new_flags(listings: Vec<Listing>) -> Vec<Listing> {
    listings
        .into_iter()
        .map(|mut l| {
            l.is_new = false;
            l
        })
        .collect()
}

fn new_listing_id() -> String {
    format!("listing-{}", Uuid::new_v4())
}
