use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
struct PreferencesData {
    #[serde(default)]
    last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    migration_completed: bool,
}

/// Durable process-wide settings: last sync time and the legacy migration flag.
///
/// Every setter writes through to disk so a crash never loses a recorded sync.
pub struct PreferencesStore {
    path: PathBuf,
    data: Mutex<PreferencesData>,
}

impl PreferencesStore {
    pub fn load(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            PreferencesData::default()
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn snapshot(&self) -> PreferencesData {
        match self.data.lock() {
            Ok(data) => data.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut PreferencesData),
    {
        let mut data = self
            .data
            .lock()
            .map_err(|_| anyhow!("preferences lock poisoned"))?;
        f(&mut data);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&*data)?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.snapshot().last_sync
    }

    pub fn set_last_sync(&self, timestamp: DateTime<Utc>) -> Result<()> {
        self.update(|data| data.last_sync = Some(timestamp))
    }

    pub fn clear_last_sync(&self) -> Result<()> {
        self.update(|data| data.last_sync = None)
    }

    pub fn migration_completed(&self) -> bool {
        self.snapshot().migration_completed
    }

    pub fn set_migration_completed(&self, completed: bool) -> Result<()> {
        self.update(|data| data.migration_completed = completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_preferences_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs").join("preferences.toml");

        let prefs = PreferencesStore::load(path.clone()).unwrap();
        assert_eq!(prefs.last_sync(), None);
        assert!(!prefs.migration_completed());

        let now = Utc::now();
        prefs.set_last_sync(now).unwrap();
        prefs.set_migration_completed(true).unwrap();

        let reloaded = PreferencesStore::load(path).unwrap();
        let last_sync = reloaded.last_sync().unwrap();
        assert!((last_sync - now).num_seconds().abs() < 1);
        assert!(reloaded.migration_completed());

        reloaded.clear_last_sync().unwrap();
        assert_eq!(reloaded.last_sync(), None);
    }
}
