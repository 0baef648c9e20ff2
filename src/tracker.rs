//! Orchestration around the engines: extraction, validation, reconciliation,
//! scoring, persistence and the activity log.
//!
//! Every read-compute-replace step over the listing set runs while holding the
//! state lock, so passes never interleave. Extraction calls are awaited before
//! the lock is taken.

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::activity::{messages, ActivityKind, ActivityLog};
use crate::config::{ConfigError, Settings};
use crate::engine::{self, Reconciliation};
use crate::extraction::{Extractor, SearchBackend, SearchRequest};
use crate::models::{validate_batch, CandidateRecord, Comment, Listing, Source};
use crate::store::Store;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Gemini API key is not configured; add it in the settings")]
    MissingApiKey,

    #[error("no sites to search; add them in the settings")]
    NoSites,

    #[error("the text to analyse is empty")]
    EmptyInput,

    #[error("listing not found: {0}")]
    ListingNotFound(String),

    #[error("invalid manual entry: {0}")]
    InvalidManualEntry(&'static str),

    #[error("comment text is empty")]
    EmptyComment,

    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),

    #[error("extraction failed: {0:#}")]
    Extraction(anyhow::Error),

    #[error("storage error: {0:#}")]
    Store(anyhow::Error),
}

/// A listing typed in by hand
#[derive(Debug, Clone)]
pub struct ManualEntry {
    pub name: String,
    pub price: f64,
    pub description: String,
    pub location: String,
    pub contact_link: Option<String>,
    pub image_urls: Vec<String>,
    pub comfort_features: Vec<String>,
    pub proximity_to_caba: u32,
    pub property_type: String,
    pub capacity: u32,
    pub availability: String,
}

impl Default for ManualEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            price: 0.0,
            description: String::new(),
            location: String::new(),
            contact_link: None,
            image_urls: Vec::new(),
            comfort_features: Vec::new(),
            proximity_to_caba: 90,
            property_type: "Casa de campo".to_string(),
            capacity: 8,
            availability: "Consultar".to_string(),
        }
    }
}

/// Field overrides for a manual edit; `None` leaves the field as it is
#[derive(Debug, Clone, Default)]
pub struct ListingEdit {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub contact_link: Option<String>,
    pub comfort_features: Option<Vec<String>>,
    pub proximity_to_caba: Option<u32>,
    pub property_type: Option<String>,
    pub capacity: Option<u32>,
    pub availability: Option<String>,
}

struct State {
    listings: Vec<Listing>,
    settings: Settings,
    activity: ActivityLog,
}

pub struct Tracker {
    store: Store,
    state: Mutex<State>,
}

impl Tracker {
    /// Load every document and rescore the listings with the stored weights.
    pub async fn open(store: Store) -> Result<Self, TrackerError> {
        let settings = store.load_settings().await.map_err(TrackerError::Store)?;
        let listings = store.load_listings().await.map_err(TrackerError::Store)?;
        let activity = store.load_activity().await.map_err(TrackerError::Store)?;

        info!(
            "Loaded {} listings and {} activity entries from {}",
            listings.len(),
            activity.len(),
            store.dir().display()
        );

        let listings = engine::score(listings, &settings.weights);

        Ok(Self {
            store,
            state: Mutex::new(State {
                listings,
                settings,
                activity,
            }),
        })
    }

    pub async fn listings(&self) -> Vec<Listing> {
        self.state.lock().await.listings.clone()
    }

    pub async fn settings(&self) -> Settings {
        self.state.lock().await.settings.clone()
    }

    pub async fn activity(&self) -> ActivityLog {
        self.state.lock().await.activity.clone()
    }

    /// Number of listings flagged by the latest reconciliation pass
    pub async fn new_count(&self) -> usize {
        self.state.lock().await.listings.iter().filter(|l| l.is_new).count()
    }

    /// Search every configured site through the search service.
    pub async fn search(&self, backend: &dyn SearchBackend) -> Result<Reconciliation, TrackerError> {
        let request = {
            let mut state = self.state.lock().await;
            let settings = state.settings.clone().with_env_api_key();

            let precondition = if !settings.has_api_key() {
                Err(TrackerError::MissingApiKey)
            } else if settings.sites.is_empty() {
                Err(TrackerError::NoSites)
            } else {
                Ok(())
            };
            if let Err(e) = precondition {
                return Err(self.fail(&mut state, e).await);
            }

            state
                .activity
                .record(ActivityKind::Search, messages::search_started(settings.sites.len()));
            self.save_activity(&state).await?;

            SearchRequest {
                sites: settings.sites,
                prompt: settings.prompt,
                api_key: settings.api_key,
            }
        };

        info!("Searching {} sites via {}", request.sites.len(), backend.source_name());
        let records = backend.search(&request).await;
        self.apply_extraction(records).await
    }

    /// Extract listings from pasted page text.
    pub async fn ingest_text(
        &self,
        extractor: &dyn Extractor,
        text: &str,
    ) -> Result<Reconciliation, TrackerError> {
        let settings = {
            let mut state = self.state.lock().await;
            let settings = state.settings.clone().with_env_api_key();

            if !settings.has_api_key() {
                return Err(self.fail(&mut state, TrackerError::MissingApiKey).await);
            }
            if text.trim().is_empty() {
                return Err(self.fail(&mut state, TrackerError::EmptyInput).await);
            }

            state
                .activity
                .record(ActivityKind::Search, messages::ingest_started());
            self.save_activity(&state).await?;
            settings
        };

        info!("Extracting listings via {}", extractor.source_name());
        let records = extractor.extract(text, &settings.prompt).await;
        self.apply_extraction(records).await
    }

    /// Reconcile candidate records that were extracted elsewhere.
    pub async fn import_candidates(&self, records: Vec<Value>) -> Result<Reconciliation, TrackerError> {
        self.apply_extraction(Ok(records)).await
    }

    async fn apply_extraction(
        &self,
        records: anyhow::Result<Vec<Value>>,
    ) -> Result<Reconciliation, TrackerError> {
        let mut state = self.state.lock().await;

        let records = match records {
            Ok(records) => records,
            Err(e) => return Err(self.fail(&mut state, TrackerError::Extraction(e)).await),
        };

        let (candidates, rejected) = validate_batch(&records);
        for r in &rejected {
            warn!("Rejected extracted record #{}: {}", r.index, r.error);
            state.activity.record(
                ActivityKind::Error,
                messages::rejected(r.index, r.name.as_deref(), &r.error.to_string()),
            );
        }

        let existing = std::mem::take(&mut state.listings);
        let mut result = engine::reconcile(existing, candidates);

        for update in &result.updated {
            state.activity.record(
                ActivityKind::Update,
                messages::price_updated(&update.listing.name, update.previous_price, update.listing.price),
            );
        }
        for listing in &result.added {
            state
                .activity
                .record(ActivityKind::New, messages::new_listing(&listing.name));
        }
        state.activity.record(
            ActivityKind::Search,
            messages::completed(result.added.len(), result.updated.len()),
        );

        info!(
            "Reconciled {} records: {} new, {} updated, {} skipped, {} rejected",
            records.len(),
            result.added.len(),
            result.updated.len(),
            result.skipped.len(),
            rejected.len()
        );

        state.listings = engine::score(std::mem::take(&mut result.listings), &state.settings.weights);
        result.listings = state.listings.clone();
        self.save_all(&state).await?;

        Ok(result)
    }

    /// Add a listing by hand. It never matches an existing one.
    pub async fn add_manual(&self, entry: ManualEntry) -> Result<Listing, TrackerError> {
        check_name(&entry.name)?;
        check_price(entry.price)?;

        let contact_link = entry.contact_link.filter(|c| !c.trim().is_empty());
        let sources = contact_link
            .iter()
            .map(|url| Source {
                site: "Manual".to_string(),
                url: url.clone(),
            })
            .collect();

        let candidate = CandidateRecord {
            name: entry.name.trim().to_string(),
            price: entry.price,
            description: entry.description,
            location: entry.location,
            contact_link,
            image_urls: entry
                .image_urls
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
            comfort_features: entry.comfort_features,
            proximity_to_caba: entry.proximity_to_caba,
            property_type: entry.property_type,
            capacity: entry.capacity,
            sources,
            availability: entry.availability,
        };

        let mut state = self.state.lock().await;
        let existing = std::mem::take(&mut state.listings);
        let (listings, added) = engine::insert_manual(existing, candidate);
        state.listings = engine::score(listings, &state.settings.weights);

        state
            .activity
            .record(ActivityKind::New, messages::manual_add(&added.name));
        info!("Manually added listing {}", added.id);
        self.save_all(&state).await?;

        Ok(find(&state.listings, &added.id)?.clone())
    }

    /// Overwrite editable fields of one listing; id, sources and comments stay.
    pub async fn edit_listing(&self, id: &str, edit: ListingEdit) -> Result<Listing, TrackerError> {
        if let Some(name) = &edit.name {
            check_name(name)?;
        }
        if let Some(price) = edit.price {
            check_price(price)?;
        }

        let mut state = self.state.lock().await;
        let index = position(&state.listings, id)?;

        let before = state.listings[index].clone();
        let mut after = before.clone();
        apply_edit(&mut after, edit);
        let summary = change_summary(&before, &after);

        state.listings[index] = after;
        let listings = std::mem::take(&mut state.listings);
        state.listings = engine::score(listings, &state.settings.weights);

        state
            .activity
            .record(ActivityKind::Update, messages::edited(&before.name, &summary));
        self.save_all(&state).await?;

        Ok(state.listings[index].clone())
    }

    pub async fn add_comment(&self, id: &str, text: &str) -> Result<Listing, TrackerError> {
        if text.trim().is_empty() {
            return Err(TrackerError::EmptyComment);
        }

        let mut state = self.state.lock().await;
        let index = position(&state.listings, id)?;

        let listing = &mut state.listings[index];
        listing.comments.push(Comment {
            text: text.to_string(),
            timestamp: chrono::Utc::now(),
        });
        let name = listing.name.clone();

        state
            .activity
            .record(ActivityKind::Comment, messages::comment_added(&name));
        self.save_all(&state).await?;

        Ok(state.listings[index].clone())
    }

    /// Mark the listing set as seen, clearing every `is_new` flag. Returns how many were cleared.
    pub async fn acknowledge(&self) -> Result<usize, TrackerError> {
        let mut state = self.state.lock().await;

        let mut cleared = 0;
        for listing in state.listings.iter_mut().filter(|l| l.is_new) {
            listing.is_new = false;
            cleared += 1;
        }

        if cleared > 0 {
            self.store
                .save_listings(&state.listings)
                .await
                .map_err(TrackerError::Store)?;
        }
        Ok(cleared)
    }

    /// Replace the settings and rescore every listing with the new weights.
    pub async fn update_settings(&self, settings: Settings) -> Result<(), TrackerError> {
        settings.validate()?;

        let mut state = self.state.lock().await;
        self.store
            .save_settings(&settings)
            .await
            .map_err(TrackerError::Store)?;

        let listings = std::mem::take(&mut state.listings);
        state.listings = engine::score(listings, &settings.weights);
        state.settings = settings;

        state
            .activity
            .record(ActivityKind::Settings, messages::settings_updated());
        info!("Settings updated, listings rescored");
        self.save_all(&state).await
    }

    /// Record a failure in the activity log and hand the error back.
    async fn fail(&self, state: &mut State, error: TrackerError) -> TrackerError {
        warn!("{}", error);
        state
            .activity
            .record(ActivityKind::Error, messages::failed(&error.to_string()));
        if let Err(e) = self.store.save_activity(&state.activity).await {
            warn!("Failed to save activity log: {:#}", e);
        }
        error
    }

    async fn save_activity(&self, state: &State) -> Result<(), TrackerError> {
        self.store
            .save_activity(&state.activity)
            .await
            .map_err(TrackerError::Store)
    }

    async fn save_all(&self, state: &State) -> Result<(), TrackerError> {
        self.store
            .save_listings(&state.listings)
            .await
            .map_err(TrackerError::Store)?;
        self.save_activity(state).await
    }
}

fn position(listings: &[Listing], id: &str) -> Result<usize, TrackerError> {
    listings
        .iter()
        .position(|l| l.id == id)
        .ok_or_else(|| TrackerError::ListingNotFound(id.to_string()))
}

fn find<'a>(listings: &'a [Listing], id: &str) -> Result<&'a Listing, TrackerError> {
    position(listings, id).map(|i| &listings[i])
}

fn check_name(name: &str) -> Result<(), TrackerError> {
    if name.trim().is_empty() {
        return Err(TrackerError::InvalidManualEntry("name is required"));
    }
    Ok(())
}

/// Also keeps NaN out of `listings.json`, where it would serialize as `null`.
fn check_price(price: f64) -> Result<(), TrackerError> {
    if !(price.is_finite() && price > 0.0) {
        return Err(TrackerError::InvalidManualEntry("price must be greater than zero"));
    }
    Ok(())
}

fn apply_edit(listing: &mut Listing, edit: ListingEdit) {
    if let Some(name) = edit.name {
        listing.name = name.trim().to_string();
    }
    if let Some(price) = edit.price {
        listing.price = price;
    }
    if let Some(description) = edit.description {
        listing.description = description;
    }
    if let Some(location) = edit.location {
        listing.location = location;
    }
    if let Some(link) = edit.contact_link {
        listing.contact_link = Some(link).filter(|l| !l.trim().is_empty());
    }
    if let Some(features) = edit.comfort_features {
        listing.comfort_features = features;
    }
    if let Some(proximity) = edit.proximity_to_caba {
        listing.proximity_to_caba = proximity;
    }
    if let Some(property_type) = edit.property_type {
        listing.property_type = property_type;
    }
    if let Some(capacity) = edit.capacity {
        listing.capacity = capacity;
    }
    if let Some(availability) = edit.availability {
        listing.availability = availability;
    }
}

/// Human-readable summary of a manual edit
pub fn change_summary(before: &Listing, after: &Listing) -> String {
    let mut changes = Vec::new();

    if before.name != after.name {
        changes.push("name".to_string());
    }
    if before.price != after.price {
        changes.push(format!("price to ${}", after.price));
    }
    if before.description != after.description {
        changes.push("description".to_string());
    }
    if before.location != after.location {
        changes.push("location".to_string());
    }
    if before.capacity != after.capacity {
        changes.push(format!("capacity to {}", after.capacity));
    }
    if before.proximity_to_caba != after.proximity_to_caba {
        changes.push(format!("proximity to {} min", after.proximity_to_caba));
    }

    let mut old_features = before.comfort_features.clone();
    let mut new_features = after.comfort_features.clone();
    old_features.sort();
    new_features.sort();
    if old_features != new_features {
        changes.push("amenities".to_string());
    }

    match changes.len() {
        0 => "No changes.".to_string(),
        n if n > 3 => format!("Updated {} attributes.", n),
        _ => format!("Changes: {}.", changes.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateRecord;

    fn listing() -> Listing {
        Listing::from_candidate(
            "l1".to_string(),
            CandidateRecord {
                name: "Casa A".to_string(),
                price: 100.0,
                description: "desc".to_string(),
                location: "Pilar".to_string(),
                contact_link: None,
                image_urls: vec![],
                comfort_features: vec!["pileta".to_string(), "wifi".to_string()],
                proximity_to_caba: 60,
                property_type: "Quinta".to_string(),
                capacity: 8,
                sources: vec![],
                availability: String::new(),
            },
        )
    }

    #[test]
    fn test_change_summary_no_changes() {
        let mut after = listing();
        after.comfort_features.reverse();
        assert_eq!(change_summary(&listing(), &after), "No changes.");
    }

    #[test]
    fn test_change_summary_lists_few_changes() {
        let mut after = listing();
        after.price = 150.0;
        after.capacity = 12;
        assert_eq!(
            change_summary(&listing(), &after),
            "Changes: price to $150, capacity to 12."
        );
    }

    #[test]
    fn test_change_summary_counts_many_changes() {
        let mut after = listing();
        after.name = "Casa B".to_string();
        after.location = "Luján".to_string();
        after.description = "nueva".to_string();
        after.proximity_to_caba = 75;
        assert_eq!(change_summary(&listing(), &after), "Updated 4 attributes.");
    }

    #[test]
    fn test_apply_edit_keeps_identity_and_comments() {
        let mut target = listing();
        target.comments.push(Comment {
            text: "ok".to_string(),
            timestamp: chrono::Utc::now(),
        });
        let comments = target.comments.clone();

        apply_edit(
            &mut target,
            ListingEdit {
                price: Some(90.0),
                contact_link: Some(" ".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(target.id, "l1");
        assert_eq!(target.price, 90.0);
        assert_eq!(target.contact_link, None);
        assert_eq!(target.comments, comments);
    }
}
