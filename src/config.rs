use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Weights;

/// Upper bound accepted for any single factor weight
pub const MAX_WEIGHT: f64 = 100.0;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const DEFAULT_PROMPT: &str = "Analiza el siguiente texto extraído de un sitio web de bienes raíces. Extrae todos los listados de propiedades que coincidan con estos criterios: casa de campo, estancia o quinta para un mínimo de 8 personas con pileta y parrilla, ubicada a menos de 2 horas de CABA.

Para cada listado válido, extrae:
- un nombre descriptivo
- el precio del alquiler como un número (sin símbolos ni texto)
- una breve descripción
- la ubicación general
- un enlace de contacto (WhatsApp o Instagram si está disponible)
- hasta 5 URL de imágenes
- características clave de confort como \"asador\", \"cancha de pádel\", etc.
- un tiempo de viaje estimado desde CABA en minutos (por ejemplo, 90 para 1.5 horas)
- el tipo de propiedad (ej. \"Casa de campo\", \"Quinta\", \"Estancia\")
- la capacidad máxima de personas como un número
- una lista de fuentes, donde cada fuente es un objeto con \"site\" (ej. \"Mercado Libre\", \"Zonaprop\", \"Airbnb\") y \"url\" (el enlace directo al anuncio)
- el estado de disponibilidad (ej. \"Disponible en Enero\", \"Consultar fechas\")

Devuelve los resultados como un arreglo JSON.";

pub const DEFAULT_SITES: [&str; 2] = [
    "https://inmuebles.mercadolibre.com.ar/quintas/alquiler/temporal/bsas-gba-norte/",
    "https://www.zonaprop.com.ar/quintas-alquiler-temporal-gba-norte.html",
];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("weight `{factor}` must be between 0 and {max}, got {value}")]
    WeightOutOfRange {
        factor: &'static str,
        value: f64,
        max: f64,
    },

    #[error("invalid site url: {0}")]
    InvalidSite(String),
}

/// User-editable tracker settings, persisted as one document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub weights: Weights,
    pub prompt: String,
    pub sites: Vec<String>,
    pub api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            prompt: DEFAULT_PROMPT.to_string(),
            sites: DEFAULT_SITES.iter().map(|s| s.to_string()).collect(),
            api_key: String::new(),
        }
    }
}

impl Settings {
    /// Merge a stored (possibly partial or older) settings document over the defaults.
    ///
    /// Unknown or mistyped keys fall back to their default value.
    pub fn from_stored(stored: &Value) -> Self {
        let mut settings = Self::default();

        if let Some(prompt) = stored.get("prompt").and_then(Value::as_str) {
            settings.prompt = prompt.to_string();
        }
        if let Some(api_key) = stored.get("apiKey").and_then(Value::as_str) {
            settings.api_key = api_key.to_string();
        }
        if let Some(sites) = stored.get("sites").and_then(Value::as_array) {
            settings.sites = sites
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        if let Some(weights) = stored.get("weights") {
            let w = &mut settings.weights;
            for (key, slot) in [
                ("price", &mut w.price),
                ("comfort", &mut w.comfort),
                ("proximity", &mut w.proximity),
            ] {
                match weights.get(key).and_then(Value::as_f64) {
                    Some(value) if weight_in_range(value) => *slot = value,
                    Some(value) => warn!(
                        "stored weight `{}` = {} is outside 0..={}, using default {}",
                        key, value, MAX_WEIGHT, slot
                    ),
                    None => {}
                }
            }
        }

        settings
    }

    /// Fill an empty credential from the environment (`.env` honoured).
    pub fn with_env_api_key(mut self) -> Self {
        if self.api_key.trim().is_empty() {
            let _ = dotenvy::dotenv();
            if let Ok(key) = env::var(API_KEY_ENV) {
                debug!("using {} from environment", API_KEY_ENV);
                self.api_key = key;
            }
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (factor, value) in [
            ("price", self.weights.price),
            ("comfort", self.weights.comfort),
            ("proximity", self.weights.proximity),
        ] {
            if !weight_in_range(value) {
                return Err(ConfigError::WeightOutOfRange {
                    factor,
                    value,
                    max: MAX_WEIGHT,
                });
            }
        }

        for site in &self.sites {
            validate_site(site)?;
        }

        Ok(())
    }

    /// Add a site to search. Returns false if it was already present.
    pub fn add_site(&mut self, site: &str) -> Result<bool, ConfigError> {
        let site = site.trim();
        validate_site(site)?;

        if self.sites.iter().any(|s| s == site) {
            return Ok(false);
        }
        self.sites.push(site.to_string());
        Ok(true)
    }

    /// Remove a site by exact match. Returns false if it was not present.
    pub fn remove_site(&mut self, site: &str) -> bool {
        let before = self.sites.len();
        self.sites.retain(|s| s != site);
        self.sites.len() != before
    }
}

fn weight_in_range(value: f64) -> bool {
    value.is_finite() && (0.0..=MAX_WEIGHT).contains(&value)
}

fn validate_site(site: &str) -> Result<(), ConfigError> {
    match Url::parse(site) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidSite(site.to_string())),
    }
}
