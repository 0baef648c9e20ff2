//! Validated candidate records.
//!
//! The extraction collaborator hands back loosely-typed JSON. Nothing reaches the
//! reconciliation engine until it has been checked and coerced here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::Source;

/// Reasons a raw extracted record is refused at the boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    Missing(&'static str),

    #[error("field `{field}` has the wrong type (expected {expected})")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{field}` must be a finite non-negative number, got {value}")]
    OutOfRange { field: &'static str, value: String },

    #[error("field `name` is empty")]
    EmptyName,

    #[error("source #{index} has an empty url")]
    EmptySourceUrl { index: usize },
}

/// A listing freshly extracted from an external source, not yet reconciled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub name: String,
    pub price: f64,
    pub description: String,
    pub location: String,
    pub contact_link: Option<String>,
    pub image_urls: Vec<String>,
    pub comfort_features: Vec<String>,
    #[serde(rename = "proximityToCABA")]
    pub proximity_to_caba: u32,
    pub property_type: String,
    pub capacity: u32,
    pub sources: Vec<Source>,
    pub availability: String,
}

/// A record dropped by [`validate_batch`], with its position in the input
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub index: usize,
    pub name: Option<String>,
    pub error: ValidationError,
}

impl CandidateRecord {
    /// Check and coerce one raw extracted record.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

        let name = required_str(obj, "name")?.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let price = required_number(obj, "price")?;
        let location = required_str(obj, "location")?.to_string();
        let sources = sources(obj)?;

        let proximity = optional_number(obj, "proximityToCABA")?.unwrap_or(0.0);
        let capacity = optional_number(obj, "capacity")?.unwrap_or(0.0);

        Ok(Self {
            name,
            price,
            description: optional_str(obj, "description")?.unwrap_or_default(),
            location,
            contact_link: optional_str(obj, "contactLink")?.filter(|s| !s.trim().is_empty()),
            image_urls: string_list(obj, "imageUrls")?,
            comfort_features: feature_set(string_list(obj, "comfortFeatures")?),
            proximity_to_caba: to_whole(proximity),
            property_type: optional_str(obj, "propertyType")?.unwrap_or_default(),
            capacity: to_whole(capacity),
            sources,
            availability: optional_str(obj, "availability")?.unwrap_or_default(),
        })
    }
}

/// Validate a whole extraction batch, keeping the good records in input order.
pub fn validate_batch(values: &[Value]) -> (Vec<CandidateRecord>, Vec<Rejected>) {
    let mut accepted = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();

    for (index, value) in values.iter().enumerate() {
        match CandidateRecord::from_value(value) {
            Ok(record) => accepted.push(record),
            Err(error) => rejected.push(Rejected {
                index,
                name: value
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                error,
            }),
        }
    }

    (accepted, rejected)
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ValidationError::Missing(field)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ValidationError::WrongType {
            field,
            expected: "string",
        }),
    }
}

fn optional_str(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::WrongType {
            field,
            expected: "string",
        }),
    }
}

fn required_number(obj: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    optional_number(obj, field)?.ok_or(ValidationError::Missing(field))
}

/// Numbers may arrive quoted ("180000"); anything else non-numeric is refused.
fn optional_number(obj: &Map<String, Value>, field: &'static str) -> Result<Option<f64>, ValidationError> {
    let number = match obj.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    let number = number.ok_or(ValidationError::WrongType {
        field,
        expected: "number",
    })?;

    if !number.is_finite() || number < 0.0 {
        return Err(ValidationError::OutOfRange {
            field,
            value: number.to_string(),
        });
    }

    Ok(Some(number))
}

fn string_list(obj: &Map<String, Value>, field: &'static str) -> Result<Vec<String>, ValidationError> {
    let items = match obj.get(field) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationError::WrongType {
                field,
                expected: "array of strings",
            })
        }
    };

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or(ValidationError::WrongType {
                    field,
                    expected: "array of strings",
                })
        })
        .collect()
}

fn sources(obj: &Map<String, Value>) -> Result<Vec<Source>, ValidationError> {
    const FIELD: &str = "sources";
    const EXPECTED: &str = "array of {site, url}";

    let items = match obj.get(FIELD) {
        None | Some(Value::Null) => return Err(ValidationError::Missing(FIELD)),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationError::WrongType {
                field: FIELD,
                expected: EXPECTED,
            })
        }
    };

    let mut out: Vec<Source> = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let entry = item.as_object().ok_or(ValidationError::WrongType {
            field: FIELD,
            expected: EXPECTED,
        })?;
        let url = required_str(entry, "url")?.trim().to_string();
        if url.is_empty() {
            return Err(ValidationError::EmptySourceUrl { index });
        }
        let site = optional_str(entry, "site")?.unwrap_or_default();

        if !out.iter().any(|s| s.url == url) {
            out.push(Source { site, url });
        }
    }

    Ok(out)
}

/// Trim, drop blanks, collapse duplicates (first spelling wins).
fn feature_set(features: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(features.len());
    for feature in features {
        let feature = feature.trim();
        if !feature.is_empty() && !out.iter().any(|f| f == feature) {
            out.push(feature.to_string());
        }
    }
    out
}

fn to_whole(value: f64) -> u32 {
    value.round().min(u32::MAX as f64) as u32
}
