// tests/tracker_flow.rs
//
// End-to-end passes through the tracker with stubbed extraction services.
//
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;

use quinta_scout::activity::ActivityKind;
use quinta_scout::config::Settings;
use quinta_scout::extraction::{Extractor, SearchBackend, SearchRequest};
use quinta_scout::models::Weights;
use quinta_scout::store::Store;
use quinta_scout::tracker::{ListingEdit, ManualEntry};
use quinta_scout::{Tracker, TrackerError};

/// Returns a canned batch and remembers the request it got
struct StubBackend {
    records: Vec<Value>,
    seen: Mutex<Option<SearchRequest>>,
}

impl StubBackend {
    fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            seen: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SearchBackend for StubBackend {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>> {
        *self.seen.lock().unwrap() = Some(request.clone());
        Ok(self.records.clone())
    }

    fn source_name(&self) -> &'static str {
        "stub"
    }
}

struct FailingBackend;

#[async_trait]
impl SearchBackend for FailingBackend {
    async fn search(&self, _request: &SearchRequest) -> Result<Vec<Value>> {
        anyhow::bail!("connection refused")
    }

    fn source_name(&self) -> &'static str {
        "failing"
    }
}

struct StubExtractor(Vec<Value>);

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(&self, _text: &str, _prompt: &str) -> Result<Vec<Value>> {
        Ok(self.0.clone())
    }

    fn source_name(&self) -> &'static str {
        "stub"
    }
}

fn record(name: &str, price: f64, url: &str) -> Value {
    json!({
        "name": name,
        "price": price,
        "description": "",
        "location": "Pilar",
        "imageUrls": [],
        "comfortFeatures": ["pileta"],
        "proximityToCABA": 60,
        "propertyType": "Quinta",
        "capacity": 10,
        "sources": [{"site": "Zonaprop", "url": url}],
        "availability": "Consultar"
    })
}

async fn tracker_with_key(dir: &std::path::Path) -> Tracker {
    let tracker = Tracker::open(Store::new(dir)).await.unwrap();
    let mut settings = Settings::default();
    settings.api_key = "test-key".to_string();
    tracker.update_settings(settings).await.unwrap();
    tracker
}

#[tokio::test]
async fn search_reconciles_scores_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;

    let mut settings = tracker.settings().await;
    settings.weights = Weights {
        price: 50.0,
        comfort: 30.0,
        proximity: 20.0,
    };
    tracker.update_settings(settings).await.unwrap();

    tracker
        .import_candidates(vec![record("Casa A", 100.0, "u1")])
        .await
        .unwrap();
    tracker.acknowledge().await.unwrap();

    let backend = StubBackend::new(vec![record("Casa A", 100.0, "u1"), record("Casa B", 200.0, "u2")]);
    let result = tracker.search(&backend).await.unwrap();

    assert_eq!(result.added.len(), 1);
    assert!(result.updated.is_empty());

    let listings = tracker.listings().await;
    assert_eq!(listings.len(), 2);
    let a = &listings[0];
    let b = &listings[1];
    assert_eq!(a.name, "Casa A");
    assert!(!a.is_new);
    assert_eq!(b.name, "Casa B");
    assert!(b.is_new);

    // Price is measured against the batch maximum (200): A = (1 - 100/200) * 100.
    assert_eq!(a.scores.price, 50);
    assert_eq!(b.scores.price, 0);
    assert!(a.score > b.score);

    let seen = backend.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.api_key, "test-key");
    assert_eq!(seen.sites.len(), 2);

    let log = tracker.activity().await;
    assert_eq!(log.entries()[0].message, "Search completed: 1 new listings found, 0 updated.");
    assert!(log
        .entries()
        .iter()
        .any(|e| e.kind == ActivityKind::New && e.message.contains("Casa B")));
}

#[tokio::test]
async fn price_change_is_logged_with_old_and_new_price() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;

    tracker
        .import_candidates(vec![record("Casa A", 100.0, "u1")])
        .await
        .unwrap();
    let result = tracker
        .import_candidates(vec![record("Casa A", 150.0, "u1")])
        .await
        .unwrap();

    assert_eq!(result.updated.len(), 1);
    assert_eq!(result.updated[0].previous_price, 100.0);

    let listings = tracker.listings().await;
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].price, 150.0);
    assert!(listings[0].is_new);

    let update = tracker
        .activity()
        .await
        .entries()
        .iter()
        .find(|e| e.kind == ActivityKind::Update)
        .cloned()
        .unwrap();
    assert!(update.message.contains("$100"));
    assert!(update.message.contains("$150"));
}

#[tokio::test]
async fn search_without_api_key_never_reaches_backend() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = Tracker::open(Store::new(dir.path())).await.unwrap();
    let backend = StubBackend::new(vec![record("Casa A", 100.0, "u1")]);

    let err = tracker.search(&backend).await.unwrap_err();
    assert!(matches!(err, TrackerError::MissingApiKey));
    assert!(backend.seen.lock().unwrap().is_none());
    assert!(tracker.listings().await.is_empty());
    assert_eq!(tracker.activity().await.entries()[0].kind, ActivityKind::Error);
}

#[tokio::test]
async fn search_without_sites_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;
    let mut settings = tracker.settings().await;
    settings.sites.clear();
    tracker.update_settings(settings).await.unwrap();

    let err = tracker.search(&StubBackend::new(vec![])).await.unwrap_err();
    assert!(matches!(err, TrackerError::NoSites));
}

#[tokio::test]
async fn extraction_failure_leaves_listings_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;
    tracker
        .import_candidates(vec![record("Casa A", 100.0, "u1")])
        .await
        .unwrap();
    let before = tracker.listings().await;

    let err = tracker.search(&FailingBackend).await.unwrap_err();
    assert!(matches!(err, TrackerError::Extraction(_)));
    assert_eq!(tracker.listings().await, before);

    let log = tracker.activity().await;
    assert_eq!(log.entries()[0].kind, ActivityKind::Error);
    assert!(log.entries()[0].message.contains("connection refused"));
}

#[tokio::test]
async fn malformed_records_are_rejected_and_logged() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;

    let extractor = StubExtractor(vec![
        record("Casa A", 100.0, "u1"),
        json!({"name": "Sin precio", "location": "Pilar", "sources": []}),
        json!("not an object"),
    ]);
    let result = tracker.ingest_text(&extractor, "<html>...</html>").await.unwrap();

    assert_eq!(result.added.len(), 1);
    let errors: Vec<_> = tracker
        .activity()
        .await
        .entries()
        .iter()
        .filter(|e| e.kind == ActivityKind::Error)
        .map(|e| e.message.clone())
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|m| m.contains("Sin precio")));
}

#[tokio::test]
async fn ingest_rejects_blank_text() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;
    let err = tracker
        .ingest_text(&StubExtractor(vec![]), "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::EmptyInput));
}

#[tokio::test]
async fn manual_add_edit_and_comment() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;

    let err = tracker
        .add_manual(ManualEntry {
            name: "Casa Manual".to_string(),
            price: 0.0,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::InvalidManualEntry(_)));

    let added = tracker
        .add_manual(ManualEntry {
            name: "Casa Manual".to_string(),
            price: 120000.0,
            location: "Luján".to_string(),
            contact_link: Some("https://wa.me/54911".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(added.is_new);
    assert_eq!(added.sources.len(), 1);
    assert_eq!(added.sources[0].site, "Manual");
    // Alone in the batch, so it is its own price maximum.
    assert_eq!(added.scores.price, 0);

    let edited = tracker
        .edit_listing(
            &added.id,
            ListingEdit {
                price: Some(90000.0),
                capacity: Some(12),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.id, added.id);
    assert_eq!(edited.price, 90000.0);
    assert_eq!(edited.sources, added.sources);

    let commented = tracker.add_comment(&added.id, "Llamar el lunes").await.unwrap();
    assert_eq!(commented.comments.len(), 1);
    let commented = tracker.add_comment(&added.id, "Confirmado").await.unwrap();
    assert_eq!(commented.comments.len(), 2);
    assert_eq!(commented.comments[0].text, "Llamar el lunes");

    assert!(matches!(
        tracker.add_comment(&added.id, "  ").await,
        Err(TrackerError::EmptyComment)
    ));
    assert!(matches!(
        tracker.add_comment("listing-missing", "hola").await,
        Err(TrackerError::ListingNotFound(_))
    ));

    let log = tracker.activity().await;
    assert!(log.entries()[0].message.starts_with("Comment added"));
    assert!(log
        .entries()
        .iter()
        .any(|e| e.message == "Edited \"Casa Manual\". Changes: price to $90000, capacity to 12."));
}

#[tokio::test]
async fn acknowledge_clears_new_flags_once() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;
    tracker
        .import_candidates(vec![record("Casa A", 100.0, "u1"), record("Casa B", 200.0, "u2")])
        .await
        .unwrap();

    assert_eq!(tracker.new_count().await, 2);
    assert_eq!(tracker.acknowledge().await.unwrap(), 2);
    assert_eq!(tracker.new_count().await, 0);
    assert_eq!(tracker.acknowledge().await.unwrap(), 0);
}

#[tokio::test]
async fn settings_change_rescores_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;
    tracker
        .import_candidates(vec![record("Casa A", 100.0, "u1"), record("Casa B", 200.0, "u2")])
        .await
        .unwrap();
    let before = tracker.listings().await[0].score;

    let mut settings = tracker.settings().await;
    settings.weights = Weights {
        price: 100.0,
        comfort: 0.0,
        proximity: 0.0,
    };
    tracker.update_settings(settings.clone()).await.unwrap();
    let after = tracker.listings().await[0].score;
    assert_ne!(before, after);
    assert_eq!(after, 50);

    settings.weights.price = 250.0;
    assert!(matches!(
        tracker.update_settings(settings).await,
        Err(TrackerError::Config(_))
    ));

    drop(tracker);
    let reopened = Tracker::open(Store::new(dir.path())).await.unwrap();
    assert_eq!(reopened.settings().await.weights.price, 100.0);
    assert_eq!(reopened.listings().await.len(), 2);
    assert_eq!(reopened.listings().await[0].score, 50);
}

#[tokio::test]
async fn invalid_edits_are_rejected_and_store_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;
    tracker
        .import_candidates(vec![record("Casa A", 100.0, "u1"), record("Casa B", 200.0, "u2")])
        .await
        .unwrap();
    let id = tracker.listings().await[0].id.clone();

    for edit in [
        ListingEdit {
            price: Some(f64::NAN),
            ..Default::default()
        },
        ListingEdit {
            price: Some(-500.0),
            ..Default::default()
        },
        ListingEdit {
            name: Some("   ".to_string()),
            ..Default::default()
        },
    ] {
        assert!(matches!(
            tracker.edit_listing(&id, edit).await,
            Err(TrackerError::InvalidManualEntry(_))
        ));
    }

    let listings = tracker.listings().await;
    assert_eq!(listings[0].name, "Casa A");
    assert_eq!(listings[0].price, 100.0);
    assert!(listings
        .iter()
        .all(|l| (0..=100).contains(&l.scores.price)));

    drop(tracker);
    let reopened = Tracker::open(Store::new(dir.path())).await.unwrap();
    let listings = reopened.listings().await;
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].price, 100.0);
}

#[tokio::test]
async fn concurrent_imports_both_land() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_with_key(dir.path()).await;

    let (first, second) = tokio::join!(
        tracker.import_candidates(vec![record("Casa A", 100.0, "u1")]),
        tracker.import_candidates(vec![record("Casa B", 200.0, "u2")]),
    );
    assert_eq!(first.unwrap().added.len(), 1);
    assert_eq!(second.unwrap().added.len(), 1);

    let names = |listings: Vec<quinta_scout::Listing>| {
        let mut names: Vec<String> = listings.into_iter().map(|l| l.name).collect();
        names.sort();
        names
    };
    assert_eq!(names(tracker.listings().await), vec!["Casa A", "Casa B"]);

    drop(tracker);
    let reopened = Tracker::open(Store::new(dir.path())).await.unwrap();
    assert_eq!(names(reopened.listings().await), vec!["Casa A", "Casa B"]);
}

#[tokio::test]
async fn out_of_range_stored_weights_load_as_defaults() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(
        dir.path().join("settings.json"),
        r#"{"weights": {"price": -50, "comfort": 1e9, "proximity": 10}}"#,
    )
    .await
    .unwrap();

    let tracker = Tracker::open(Store::new(dir.path())).await.unwrap();
    let weights = tracker.settings().await.weights;
    assert_eq!(weights, Weights { price: 35.0, comfort: 40.0, proximity: 10.0 });
}
