use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a user-facing activity entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Search,
    New,
    Update,
    Comment,
    Settings,
    Error,
    #[default]
    Other,
}

impl std::str::FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "new" => Ok(Self::New),
            "update" => Ok(Self::Update),
            "comment" => Ok(Self::Comment),
            "settings" => Ok(Self::Settings),
            "error" => Ok(Self::Error),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown activity kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub kind: ActivityKind,
}

impl ActivityEntry {
    pub fn new(kind: ActivityKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Criteria for narrowing the activity log
#[derive(Debug, Clone, Default)]
pub struct ActivityQuery {
    pub kind: Option<ActivityKind>,
    pub text: String,
    /// Inclusive, whole calendar days (UTC)
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Append-only activity log, newest entry first
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ActivityLog {
    entries: Vec<ActivityEntry>,
}

impl ActivityLog {
    pub fn new(entries: Vec<ActivityEntry>) -> Self {
        Self { entries }
    }

    pub fn record(&mut self, kind: ActivityKind, message: impl Into<String>) -> &ActivityEntry {
        self.entries.insert(0, ActivityEntry::new(kind, message));
        &self.entries[0]
    }

    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn filter(&self, query: &ActivityQuery) -> Vec<&ActivityEntry> {
        let text = query.text.to_lowercase();

        self.entries
            .iter()
            .filter(|e| e.message.to_lowercase().contains(&text))
            .filter(|e| query.kind.map_or(true, |k| e.kind == k))
            .filter(|e| {
                let day = e.timestamp.date_naive();
                query.from.map_or(true, |from| day >= from) && query.to.map_or(true, |to| day <= to)
            })
            .collect()
    }
}

/// Typed constructors for every message the tracker records
pub mod messages {
    pub fn search_started(sites: usize) -> String {
        format!("Search started across {} sites...", sites)
    }

    pub fn ingest_started() -> String {
        "Extracting listings from pasted text...".to_string()
    }

    pub fn new_listing(name: &str) -> String {
        format!("New listing found: \"{}\".", name)
    }

    pub fn price_updated(name: &str, old: f64, new: f64) -> String {
        format!("Listing updated: \"{}\". Price changed from ${} to ${}.", name, old, new)
    }

    pub fn rejected(index: usize, name: Option<&str>, error: &str) -> String {
        match name {
            Some(name) => format!("Discarded extracted record #{} (\"{}\"): {}.", index, name, error),
            None => format!("Discarded extracted record #{}: {}.", index, error),
        }
    }

    pub fn completed(added: usize, updated: usize) -> String {
        format!("Search completed: {} new listings found, {} updated.", added, updated)
    }

    pub fn failed(error: &str) -> String {
        format!("Error: {}", error)
    }

    pub fn settings_updated() -> String {
        "Settings updated.".to_string()
    }

    pub fn manual_add(name: &str) -> String {
        format!("Manually added listing \"{}\".", name)
    }

    pub fn edited(name: &str, summary: &str) -> String {
        format!("Edited \"{}\". {}", name, summary)
    }

    pub fn comment_added(name: &str) -> String {
        format!("Comment added to \"{}\".", name)
    }
}
