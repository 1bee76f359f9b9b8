use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use watchdeck_models::{EpisodeFinding, RemoteFileRecord};
use crate::error::{SourceError, StorageError};

/// One provider in the episode lookup chain.
#[async_trait]
pub trait EpisodeSource: Send + Sync {
    fn source_name(&self) -> &str;

    /// Look the title up and return a finding only when the provider's result
    /// matches the title and reports a positive episode count.
    async fn try_resolve(&self, title: &str) -> Result<Option<EpisodeFinding>, SourceError>;
}

/// Remote file storage the library is mirrored to.
///
/// Paths are absolute remote paths ("/root/titles.json"); the empty string is the storage root.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    fn storage_name(&self) -> &str;

    /// Recursively list every file under `root`. A missing root lists as empty.
    async fn list_files(&self, root: &str) -> Result<Vec<RemoteFileRecord>, StorageError>;

    /// Upload a local file, overwriting whatever is at `remote_path`
    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        client_modified: DateTime<Utc>,
    ) -> Result<RemoteFileRecord, StorageError>;

    /// Download `remote_path` to `local_path`, creating parent directories
    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), StorageError>;

    async fn metadata(&self, remote_path: &str) -> Result<Option<RemoteFileRecord>, StorageError>;
}
