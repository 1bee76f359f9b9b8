use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    pub fn get_tmdb_api_key(&self) -> Option<&String> {
        self.get("tmdb_api_key").filter(|k| !k.is_empty())
    }

    pub fn set_tmdb_api_key(&mut self, key: String) {
        self.set("tmdb_api_key".to_string(), key);
    }

    // Dropbox credential methods
    pub fn get_dropbox_app_key(&self) -> Option<&String> {
        self.get("dropbox_app_key").filter(|k| !k.is_empty())
    }

    pub fn set_dropbox_app_key(&mut self, key: String) {
        self.set("dropbox_app_key".to_string(), key);
    }

    pub fn get_dropbox_access_token(&self) -> Option<&String> {
        self.get("dropbox_access_token").filter(|k| !k.is_empty())
    }

    pub fn set_dropbox_access_token(&mut self, token: String) {
        self.set("dropbox_access_token".to_string(), token);
    }

    pub fn get_dropbox_refresh_token(&self) -> Option<&String> {
        self.get("dropbox_refresh_token").filter(|k| !k.is_empty())
    }

    pub fn set_dropbox_refresh_token(&mut self, token: String) {
        self.set("dropbox_refresh_token".to_string(), token);
    }

    pub fn has_dropbox(&self) -> bool {
        self.get_dropbox_access_token().is_some()
            || (self.get_dropbox_app_key().is_some() && self.get_dropbox_refresh_token().is_some())
    }

    pub fn clear_dropbox(&mut self) {
        for key in [
            "dropbox_app_key",
            "dropbox_access_token",
            "dropbox_refresh_token",
        ] {
            self.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_credential_store_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut store = CredentialStore::new(path.clone());
        store.set_tmdb_api_key("tmdb_key".to_string());
        store.set_dropbox_access_token("sl.token".to_string());
        store.save().unwrap();

        let mut loaded_store = CredentialStore::new(path);
        loaded_store.load().unwrap();
        assert_eq!(loaded_store.get_tmdb_api_key(), Some(&"tmdb_key".to_string()));
        assert_eq!(loaded_store.get_dropbox_access_token(), Some(&"sl.token".to_string()));
        assert!(loaded_store.has_dropbox());
    }

    #[test]
    fn test_empty_values_are_treated_as_missing() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/unused"));
        store.set_tmdb_api_key(String::new());
        assert_eq!(store.get_tmdb_api_key(), None);

        store.set_dropbox_app_key("app".to_string());
        assert!(!store.has_dropbox());
        store.set_dropbox_refresh_token("refresh".to_string());
        assert!(store.has_dropbox());

        store.clear_dropbox();
        assert!(!store.has_dropbox());
    }
}
