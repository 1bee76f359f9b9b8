pub mod config;
pub mod credentials;
pub mod paths;
pub mod preferences;

pub use config::{Config, ProvidersConfig, SchedulerConfig, SyncConfig, default_scheduler_config};
pub use credentials::CredentialStore;
pub use paths::{PathManager, container_base_path};
pub use preferences::PreferencesStore;
