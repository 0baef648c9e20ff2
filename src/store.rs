use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::activity::ActivityLog;
use crate::config::Settings;
use crate::models::Listing;

const LISTINGS_FILE: &str = "listings.json";
const SETTINGS_FILE: &str = "settings.json";
const ACTIVITY_FILE: &str = "activity_log.json";

/// Whole-document JSON persistence for listings, settings and the activity log
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn load_listings(&self) -> Result<Vec<Listing>> {
        Ok(self.read(LISTINGS_FILE).await?.unwrap_or_default())
    }

    pub async fn save_listings(&self, listings: &[Listing]) -> Result<()> {
        self.write(LISTINGS_FILE, listings).await
    }

    /// Stored settings merged over the defaults; missing file means defaults.
    pub async fn load_settings(&self) -> Result<Settings> {
        let stored: Option<Value> = self.read(SETTINGS_FILE).await?;
        Ok(stored
            .map(|v| Settings::from_stored(&v))
            .unwrap_or_default())
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write(SETTINGS_FILE, settings).await
    }

    pub async fn load_activity(&self) -> Result<ActivityLog> {
        Ok(self.read(ACTIVITY_FILE).await?.unwrap_or_default())
    }

    pub async fn save_activity(&self, log: &ActivityLog) -> Result<()> {
        self.write(ACTIVITY_FILE, log).await
    }

    async fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.dir.join(name);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found, starting empty", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        let value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    async fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("saved {}", path.display());
        Ok(())
    }
}
