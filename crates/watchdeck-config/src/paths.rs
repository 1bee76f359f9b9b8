use anyhow::Result;
use std::path::{Path, PathBuf};

/// Get the container base path from environment variable, defaulting to "/app"
pub fn container_base_path() -> PathBuf {
    std::env::var("WATCHDECK_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/app"))
}

pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("watchdeck");
        let data_dir = dirs::data_dir()
            .map(|d| d.join("watchdeck"))
            .unwrap_or_else(|| config_dir.join("data"));

        Ok(Self {
            log_dir: data_dir.join("logs"),
            config_dir,
            data_dir,
        })
    }

    pub fn from_docker_env() -> Self {
        let base = container_base_path();
        Self {
            config_dir: base.clone(),
            data_dir: base.join("data"),
            log_dir: base.join("logs"),
        }
    }

    /// Build a manager rooted at an arbitrary directory (used by tests and --base-dir)
    pub fn with_base(base: &Path) -> Self {
        Self {
            config_dir: base.to_path_buf(),
            data_dir: base.join("data"),
            log_dir: base.join("logs"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Root of the library: JSON state files plus the image collection.
    /// This is the folder mirrored to the remote.
    pub fn library_dir(&self) -> PathBuf {
        self.data_dir.join("library")
    }

    pub fn images_dir(&self, images_dir_name: &str) -> PathBuf {
        self.library_dir().join(images_dir_name)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.toml")
    }

    pub fn preferences_file(&self) -> PathBuf {
        self.data_dir.join("preferences.toml")
    }

    pub fn daemon_log_file(&self) -> PathBuf {
        self.log_dir.join("watchdeck.log")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        std::fs::create_dir_all(self.library_dir())?;
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        // The container image creates the base path, so its presence means we run in Docker
        let base = container_base_path();
        if base.exists() {
            return Self::from_docker_env();
        }

        Self::new().unwrap_or_else(|_| Self::from_docker_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_with_base_layout() {
        let dir = TempDir::new().unwrap();
        let paths = PathManager::with_base(dir.path());
        assert_eq!(paths.config_file(), dir.path().join("config.toml"));
        assert_eq!(paths.library_dir(), dir.path().join("data").join("library"));
        assert_eq!(
            paths.images_dir("images"),
            dir.path().join("data").join("library").join("images")
        );

        paths.ensure_directories().unwrap();
        assert!(paths.library_dir().is_dir());
        assert!(paths.log_dir().is_dir());
    }
}
