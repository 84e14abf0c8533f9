//! Local JSON file store with rolling backups

use super::ResultStore;
use crate::error::{LeagueError, Result};
use async_trait::async_trait;
use chrono::Local;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Stores each document as `<data_dir>/<name>`, copying the previous version
/// into `<data_dir>/backups/` before every overwrite
pub struct LocalStore {
    base_dir: PathBuf,
    backup_dir: PathBuf,
    generations: usize,
}

impl LocalStore {
    /// Open the store, creating its directories if needed
    pub async fn open(base_dir: impl AsRef<Path>, generations: usize) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let backup_dir = base_dir.join("backups");

        fs::create_dir_all(&backup_dir).await?;

        Ok(Self {
            base_dir,
            backup_dir,
            generations: generations.max(1),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return Err(LeagueError::MalformedRecord(format!(
                "invalid document name {:?}",
                name
            )));
        }
        Ok(self.base_dir.join(name))
    }

    /// Existing backups of a document, oldest first
    pub async fn backups_for(&self, name: &str) -> Result<Vec<PathBuf>> {
        let (stem, ext) = split_name(name);
        let pattern = Regex::new(&format!(
            r"^{}_\d{{8}}_\d{{6}}_\d{{3}}(?:_\d{{2}})?{}$",
            regex::escape(stem),
            regex::escape(ext)
        ))
        .map_err(|e| LeagueError::MalformedRecord(format!("backup pattern for {}: {}", name, e)))?;

        let mut backups = Vec::new();
        let mut entries = fs::read_dir(&self.backup_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if pattern.is_match(&file_name.to_string_lossy()) {
                backups.push(entry.path());
            }
        }

        // Timestamps are zero-padded, so name order is age order
        backups.sort();
        Ok(backups)
    }

    async fn create_backup(&self, name: &str, path: &Path) -> Result<()> {
        if fs::metadata(path).await.is_err() {
            return Ok(());
        }

        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let backup_path = self.free_backup_path(name, &stamp).await?;
        fs::copy(path, &backup_path).await?;
        debug!("Backed up {} to {}", name, backup_path.display());

        let backups = self.backups_for(name).await?;
        if backups.len() > self.generations {
            for old in &backups[..backups.len() - self.generations] {
                if let Err(e) = fs::remove_file(old).await {
                    warn!("Failed to prune backup {}: {}", old.display(), e);
                }
            }
        }

        Ok(())
    }

    /// Backup path for `stamp`, suffixed `_01`.. when saves land in the same millisecond
    async fn free_backup_path(&self, name: &str, stamp: &str) -> Result<PathBuf> {
        let (stem, ext) = split_name(name);
        let path = self.backup_dir.join(format!("{}_{}{}", stem, stamp, ext));
        if !fs::try_exists(&path).await? {
            return Ok(path);
        }

        for n in 1..100 {
            let path = self
                .backup_dir
                .join(format!("{}_{}_{:02}{}", stem, stamp, n, ext));
            if !fs::try_exists(&path).await? {
                return Ok(path);
            }
        }

        Err(LeagueError::CorruptStore {
            name: name.to_string(),
            reason: format!("no free backup name for {}", stamp),
        })
    }

    async fn restore_from_backup(&self, name: &str) -> Result<Option<Value>> {
        let backups = self.backups_for(name).await?;

        for backup in backups.iter().rev() {
            let text = match fs::read_to_string(backup).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to read backup {}: {}", backup.display(), e);
                    continue;
                }
            };

            match serde_json::from_str(&text) {
                Ok(value) => {
                    info!("Recovered {} from backup {}", name, backup.display());
                    return Ok(Some(value));
                }
                Err(e) => warn!("Backup {} is also unreadable: {}", backup.display(), e),
            }
        }

        let err = LeagueError::CorruptStore {
            name: name.to_string(),
            reason: format!("no readable backup among {}", backups.len()),
        };
        error!("{}; treating document as absent", err);
        Ok(None)
    }
}

#[async_trait]
impl ResultStore for LocalStore {
    async fn load(&self, name: &str) -> Result<Option<Value>> {
        let path = self.path_for(name)?;

        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Error reading {}: {}", name, e);
                self.restore_from_backup(name).await
            }
        }
    }

    async fn save(&self, name: &str, data: &Value) -> Result<()> {
        let path = self.path_for(name)?;
        self.create_backup(name, &path).await?;

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        data.serialize(&mut serializer)?;

        let tmp_path = self.base_dir.join(format!(".{}.tmp", name));
        fs::write(&tmp_path, &buf).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!("Saved {} ({} bytes)", name, buf.len());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("local ({})", self.base_dir.display())
    }
}

fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), 5).await.unwrap();

        assert!(store.load("teams_info.json").await.unwrap().is_none());

        store.save("teams_info.json", &json!({"a": 1})).await.unwrap();
        assert_eq!(store.load("teams_info.json").await.unwrap(), Some(json!({"a": 1})));

        let raw = std::fs::read_to_string(dir.path().join("teams_info.json")).unwrap();
        assert!(raw.contains("\n    \"a\": 1"));
    }

    #[tokio::test]
    async fn test_keeps_last_generations() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), 5).await.unwrap();

        // Back-to-back saves may share a millisecond stamp
        for i in 0..8 {
            store.save("payments.json", &json!({ "n": i })).await.unwrap();
        }

        let backups = store.backups_for("payments.json").await.unwrap();
        assert_eq!(backups.len(), 5);
        let newest = std::fs::read_to_string(backups.last().unwrap()).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&newest).unwrap(), json!({"n": 6}));
        assert_eq!(store.load("payments.json").await.unwrap(), Some(json!({"n": 7})));
    }

    #[tokio::test]
    async fn test_same_stamp_backups_get_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), 5).await.unwrap();
        let stamp = "20261015_120000_123";

        let first = store.free_backup_path("teams_info.json", stamp).await.unwrap();
        std::fs::write(&first, "{}").unwrap();
        let second = store.free_backup_path("teams_info.json", stamp).await.unwrap();
        std::fs::write(&second, "{}").unwrap();
        let third = store.free_backup_path("teams_info.json", stamp).await.unwrap();

        assert!(first.ends_with("teams_info_20261015_120000_123.json"));
        assert!(second.ends_with("teams_info_20261015_120000_123_01.json"));
        assert!(third.ends_with("teams_info_20261015_120000_123_02.json"));

        // Suffixed names still sort after the plain stamp
        let backups = store.backups_for("teams_info.json").await.unwrap();
        assert_eq!(backups, vec![first, second]);
    }

    #[tokio::test]
    async fn test_backups_do_not_mix_similar_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), 5).await.unwrap();

        store.save("week_1_matchup.json", &json!([])).await.unwrap();
        store.save("week_1_matchup.json", &json!([1])).await.unwrap();
        store.save("week_10_matchup.json", &json!([])).await.unwrap();
        store.save("week_10_matchup.json", &json!([10])).await.unwrap();

        assert_eq!(store.backups_for("week_1_matchup.json").await.unwrap().len(), 1);
        assert_eq!(store.backups_for("week_10_matchup.json").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recovers_corrupt_document_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), 5).await.unwrap();

        store.save("skins_winners.json", &json!({"v": 1})).await.unwrap();
        store.save("skins_winners.json", &json!({"v": 2})).await.unwrap();
        std::fs::write(dir.path().join("skins_winners.json"), "{ not json").unwrap();

        let recovered = store.load("skins_winners.json").await.unwrap();
        assert_eq!(recovered, Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn test_corrupt_without_backup_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), 5).await.unwrap();

        std::fs::write(dir.path().join("survivor.json"), "garbage").unwrap();
        assert!(store.load("survivor.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), 5).await.unwrap();
        assert!(store.save("../escape.json", &json!(1)).await.is_err());
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("week_3_matchup.json"), ("week_3_matchup", ".json"));
        assert_eq!(split_name("plain"), ("plain", ""));
    }
}
