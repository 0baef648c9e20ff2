pub mod candidate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use candidate::{validate_batch, CandidateRecord, Rejected, ValidationError};

/// One origin posting of a listing (marketplace, classifieds site, manual entry)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub site: String,
    pub url: String,
}

/// User-authored note attached to a listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-factor breakdown of a listing's score, each in 0..=100
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FactorScores {
    pub price: i32,
    pub comfort: i32,
    pub proximity: i32,
}

/// Relative influence of each factor on the total score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Weights {
    pub price: f64,
    pub comfort: f64,
    pub proximity: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            price: 35.0,
            comfort: 40.0,
            proximity: 25.0,
        }
    }
}

/// Core rental listing data model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub description: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_link: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub comfort_features: Vec<String>,
    /// Travel time to CABA in minutes
    #[serde(rename = "proximityToCABA")]
    pub proximity_to_caba: u32,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub scores: FactorScores,
    #[serde(default)]
    pub is_new: bool,
    pub property_type: String,
    pub capacity: u32,
    #[serde(default)]
    pub sources: Vec<Source>,
    pub availability: String,
}

impl Listing {
    /// Create a fresh, unscored listing from a candidate record
    pub fn from_candidate(id: String, candidate: CandidateRecord) -> Self {
        Self {
            id,
            name: candidate.name,
            price: candidate.price,
            description: candidate.description,
            location: candidate.location,
            contact_link: candidate.contact_link,
            image_urls: candidate.image_urls,
            comfort_features: candidate.comfort_features,
            proximity_to_caba: candidate.proximity_to_caba,
            comments: Vec::new(),
            score: 0,
            scores: FactorScores::default(),
            is_new: true,
            property_type: candidate.property_type,
            capacity: candidate.capacity,
            sources: candidate.sources,
            availability: candidate.availability,
        }
    }

    /// Overwrite every candidate-carried field except sources, keeping id and comments.
    /// Sources are unioned by url.
    pub fn merge_candidate(&mut self, candidate: CandidateRecord) {
        self.name = candidate.name;
        self.price = candidate.price;
        self.description = candidate.description;
        self.location = candidate.location;
        self.contact_link = candidate.contact_link;
        self.image_urls = candidate.image_urls;
        self.comfort_features = candidate.comfort_features;
        self.proximity_to_caba = candidate.proximity_to_caba;
        self.property_type = candidate.property_type;
        self.capacity = candidate.capacity;
        self.availability = candidate.availability;

        for source in candidate.sources {
            if !self.has_source_url(&source.url) {
                self.sources.push(source);
            }
        }
    }

    pub fn has_source_url(&self, url: &str) -> bool {
        self.sources.iter().any(|s| s.url == url)
    }

    /// True if the two source sets share at least one url
    pub fn shares_source_with(&self, sources: &[Source]) -> bool {
        sources.iter().any(|s| self.has_source_url(&s.url))
    }

    /// Case-insensitive name + location equality
    pub fn same_name_and_location(&self, name: &str, location: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
            && self.location.to_lowercase() == location.to_lowercase()
    }
}
