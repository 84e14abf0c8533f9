//! Persistence of named JSON documents
//!
//! Every league artifact (roster, weekly matchups, bonus results, payments) is a
//! named JSON document. Backends only move documents; everything above this
//! module talks to `dyn ResultStore`.

pub mod github;
pub mod local;
pub mod memory;

pub use github::GitHubStore;
pub use local::LocalStore;
pub use memory::MemoryStore;

use crate::config::{Config, StorageBackend};
use crate::error::{LeagueError, Result};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

/// Document names shared by every backend
pub mod documents {
    pub const TEAMS: &str = "teams_info.json";
    pub const SKINS: &str = "skins_winners.json";
    pub const SURVIVOR: &str = "survivor.json";
    pub const PAYMENTS: &str = "payments.json";

    pub fn week_matchups(week: u32) -> String {
        format!("week_{}_matchup.json", week)
    }

    pub fn season_export(year: i32) -> String {
        format!("season_{}.json", year)
    }
}

/// Key-value store of JSON documents
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Load a document; `None` when it does not exist or cannot be recovered
    async fn load(&self, name: &str) -> Result<Option<Value>>;

    /// Persist a document, replacing any previous version
    async fn save(&self, name: &str, data: &Value) -> Result<()>;

    /// Backend name for display
    fn describe(&self) -> String;
}

/// Open the backend selected in the configuration
pub async fn open_store(config: &Config) -> Result<Arc<dyn ResultStore>> {
    let store: Arc<dyn ResultStore> = match config.storage.backend {
        StorageBackend::Local => Arc::new(
            LocalStore::open(&config.storage.data_dir, config.storage.backup_generations).await?,
        ),
        StorageBackend::GitHub => Arc::new(GitHubStore::from_config(config)?),
    };

    info!("Using storage backend: {}", store.describe());
    Ok(store)
}

/// Load and deserialize a document
pub async fn load_doc<T: DeserializeOwned>(store: &dyn ResultStore, name: &str) -> Result<Option<T>> {
    match store.load(name).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| LeagueError::MalformedRecord(format!("{}: {}", name, e))),
        None => Ok(None),
    }
}

/// Serialize and persist a document
pub async fn save_doc<T: Serialize + ?Sized>(store: &dyn ResultStore, name: &str, data: &T) -> Result<()> {
    let value = serde_json::to_value(data)?;
    store.save(name, &value).await
}

/// Combine every stored document for the season into `season_<year>.json`
pub async fn export_season(store: &dyn ResultStore, config: &Config) -> Result<String> {
    let now = Utc::now();

    let mut weeks = Map::new();
    for week in 1..=config.game.season_weeks {
        if let Some(data) = store.load(&documents::week_matchups(week)).await? {
            weeks.insert(week.to_string(), data);
        }
    }

    let season = json!({
        "teams": store.load(documents::TEAMS).await?,
        "weeks": Value::Object(weeks),
        "skins": store.load(documents::SKINS).await?,
        "survivor": store.load(documents::SURVIVOR).await?,
        "payments": store.load(documents::PAYMENTS).await?,
        "timestamp": now.to_rfc3339(),
    });

    let name = documents::season_export(now.year());
    store.save(&name, &season).await?;
    info!("Exported season data to {}", name);

    Ok(name)
}
