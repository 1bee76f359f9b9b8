use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::sync::Arc;
use tracing::{info, warn};
use watchdeck_config::{Config, CredentialStore, PathManager, PreferencesStore};
use watchdeck_core::{EpisodeResolver, FileSynchronizer, LibraryStore, SyncSettings};
use watchdeck_sources::{DropboxClient, ProviderRegistry, RemoteStorage};

/// Everything a command needs, loaded once from the standard locations.
pub struct AppContext {
    pub paths: PathManager,
    pub config: Config,
    pub credentials: CredentialStore,
    pub preferences: Arc<PreferencesStore>,
    pub library: Arc<LibraryStore>,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let paths = PathManager::default();
        paths
            .ensure_directories()
            .map_err(|e| eyre!("Failed to create data directories: {}", e))?;

        let config_file = paths.config_file();
        let config = Config::load_or_default(&config_file)
            .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
        config
            .validate()
            .map_err(|e| eyre!("Configuration validation failed: {}", e))?;

        let credentials_file = paths.credentials_file();
        let mut credentials = CredentialStore::new(credentials_file.clone());
        credentials
            .load()
            .map_err(|e| eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;

        let preferences_file = paths.preferences_file();
        let preferences = PreferencesStore::load(preferences_file.clone())
            .map_err(|e| eyre!("Failed to load preferences from {}: {}", preferences_file.display(), e))?;

        let library = LibraryStore::open(paths.library_dir())?;

        let context = Self {
            paths,
            config,
            credentials,
            preferences: Arc::new(preferences),
            library: Arc::new(library),
        };
        context.migrate_once();
        Ok(context)
    }

    /// Import the legacy list the first time any command runs
    fn migrate_once(&self) {
        if self.preferences.migration_completed() {
            return;
        }
        match self.library.migrate_legacy() {
            Ok(imported) => {
                if imported > 0 {
                    info!(imported, "Imported legacy library");
                }
                if let Err(e) = self.preferences.set_migration_completed(true) {
                    warn!(error = %e, "Failed to record migration flag");
                }
            }
            Err(e) => warn!(error = %e, "Legacy migration failed, will retry next run"),
        }
    }

    pub fn resolver(&self) -> Arc<EpisodeResolver> {
        let registry = ProviderRegistry::new(&self.config);
        Arc::new(EpisodeResolver::new(registry.build_chains(&self.config, &self.credentials)))
    }

    pub fn storage(&self) -> Option<Arc<DropboxClient>> {
        ProviderRegistry::new(&self.config)
            .build_dropbox(&self.credentials)
            .map(Arc::new)
    }

    pub fn synchronizer(&self, storage: Arc<DropboxClient>) -> Arc<FileSynchronizer> {
        let storage: Arc<dyn RemoteStorage> = storage;
        Arc::new(FileSynchronizer::new(
            storage,
            self.paths.library_dir(),
            SyncSettings::from_config(&self.config.sync),
            self.preferences.clone(),
        ))
    }

    /// Accept a full id or an unambiguous prefix of one
    pub fn resolve_title_id(&self, id: &str) -> Result<String> {
        let titles = self.library.load_titles()?;
        if titles.iter().any(|t| t.id == id) {
            return Ok(id.to_string());
        }
        let matches: Vec<&str> = titles
            .iter()
            .filter(|t| t.id.starts_with(id))
            .map(|t| t.id.as_str())
            .collect();
        match matches.as_slice() {
            [single] => Ok(single.to_string()),
            [] => Err(eyre!("No title with id '{}'", id)),
            _ => Err(eyre!("Id prefix '{}' matches {} titles, use more characters", id, matches.len())),
        }
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn no_storage_error() -> color_eyre::Report {
    eyre!("Dropbox is not configured. Run 'watchdeck config dropbox' first.")
}
