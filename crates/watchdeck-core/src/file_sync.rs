//! Two-way mirror of the library folder to remote storage.
//!
//! A pass lists the remote tree once, diffs it against the local folder and
//! runs the resulting transfers one by one. The fixed JSON state files are
//! compared by modification time; images are compared by name only.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use watchdeck_config::{PreferencesStore, SyncConfig};
use watchdeck_models::{RemoteFileRecord, SyncOutcome, SyncReport, SyncScenario, SyncState};
use watchdeck_sources::{RemoteStorage, StorageError};
use crate::image_order::compare_image_names;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// "" for the storage root, otherwise "/folder" without a trailing slash
    pub remote_root: String,
    pub state_files: Vec<String>,
    pub images_dir: String,
    pub tolerance: Duration,
    pub upload_pause: std::time::Duration,
}

impl SyncSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            remote_root: normalize_remote_root(&config.remote_root),
            state_files: config.state_files.clone(),
            images_dir: config.images_dir.trim_matches('/').to_string(),
            tolerance: Duration::milliseconds(config.tolerance_ms),
            upload_pause: std::time::Duration::from_millis(config.upload_pause_ms),
        }
    }

    pub fn remote_path(&self, relative: &str) -> String {
        format!("{}/{}", self.remote_root, relative)
    }

    fn image_relative(&self, name: &str) -> String {
        format!("{}/{}", self.images_dir, name)
    }

    /// Local spelling of a remote relative path and whether it is an image.
    ///
    /// Remote folders match case-insensitively, so state files and the images
    /// folder take their configured names; only the image file name keeps the
    /// remote case.
    fn local_relative(&self, remote_relative: &str) -> (String, bool) {
        if let Some(name) = self
            .state_files
            .iter()
            .find(|name| name.eq_ignore_ascii_case(remote_relative))
        {
            return (name.clone(), false);
        }

        let depth = self.images_dir.split('/').count();
        let segments: Vec<&str> = remote_relative.split('/').collect();
        if segments.len() > depth
            && segments[..depth].join("/").to_lowercase() == self.images_dir.to_lowercase()
        {
            return (self.image_relative(&segments[depth..].join("/")), true);
        }
        (remote_relative.to_string(), false)
    }

    /// Path of `record` relative to the remote root, or `None` when it lives elsewhere
    /// or would escape the local root
    fn relative_of(&self, record: &RemoteFileRecord) -> Option<String> {
        let root_lower = self.remote_root.to_lowercase();
        let prefix = format!("{}/", root_lower);
        if !record.path_lower.starts_with(&prefix) {
            return None;
        }
        let relative: String = record
            .path_display
            .chars()
            .skip(self.remote_root.chars().count() + 1)
            .collect();
        let safe = relative
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        safe.then_some(relative)
    }
}

fn normalize_remote_root(root: &str) -> String {
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Upload,
    Download,
    Skip,
}

pub fn choose_scenario(local_empty: bool, remote_empty: bool) -> SyncScenario {
    match (local_empty, remote_empty) {
        (false, true) => SyncScenario::FirstUpload,
        (true, false) => SyncScenario::Restore,
        _ => SyncScenario::TwoWay,
    }
}

/// Direction for a file known on one or both sides.
///
/// Timestamps within `tolerance` of each other count as the same version;
/// the difference must strictly exceed it before anything moves.
pub fn decide_transfer(
    local: Option<DateTime<Utc>>,
    remote: Option<DateTime<Utc>>,
    tolerance: Duration,
) -> Transfer {
    match (local, remote) {
        (Some(_), None) => Transfer::Upload,
        (None, Some(_)) => Transfer::Download,
        (None, None) => Transfer::Skip,
        (Some(local), Some(remote)) => {
            let diff = remote - local;
            if diff > tolerance {
                Transfer::Download
            } else if -diff > tolerance {
                Transfer::Upload
            } else {
                Transfer::Skip
            }
        }
    }
}

/// One file movement decided by [`FileSynchronizer::plan`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStep {
    pub relative: String,
    pub transfer: Transfer,
    pub local_path: PathBuf,
    pub remote_path: String,
    /// Server timestamp from the listing, for downloads
    pub remote_modified: Option<DateTime<Utc>>,
    pub is_image: bool,
}

#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub scenario: SyncScenario,
    /// State files first, then images in numeric-aware order
    pub steps: Vec<SyncStep>,
    pub skipped: usize,
}

struct LocalFile {
    relative: String,
    path: PathBuf,
    modified: DateTime<Utc>,
}

struct LocalInventory {
    state: Vec<LocalFile>,
    /// Keyed by lowercase file name
    images: HashMap<String, LocalFile>,
}

impl LocalInventory {
    fn is_empty(&self) -> bool {
        self.state.is_empty() && self.images.is_empty()
    }
}

async fn modified_time(path: &Path) -> std::io::Result<Option<DateTime<Utc>>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Align the local mtime with the remote copy so the next pass sees them as equal
fn align_mtime(path: &Path, modified: DateTime<Utc>) {
    let result = std::fs::File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::from(modified)));
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Failed to set modification time");
    }
}

pub struct FileSynchronizer {
    storage: Arc<dyn RemoteStorage>,
    local_root: PathBuf,
    settings: SyncSettings,
    preferences: Arc<PreferencesStore>,
    in_flight: tokio::sync::Mutex<()>,
    state: Mutex<SyncState>,
}

impl FileSynchronizer {
    pub fn new(
        storage: Arc<dyn RemoteStorage>,
        local_root: impl Into<PathBuf>,
        settings: SyncSettings,
        preferences: Arc<PreferencesStore>,
    ) -> Self {
        Self {
            storage,
            local_root: local_root.into(),
            settings,
            preferences,
            in_flight: tokio::sync::Mutex::new(()),
            state: Mutex::new(SyncState::Idle),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn state(&self) -> SyncState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, new_state: SyncState) {
        match self.state.lock() {
            Ok(mut state) => *state = new_state,
            Err(poisoned) => *poisoned.into_inner() = new_state,
        }
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.preferences.last_sync()
    }

    /// Run one pass unless another one is in progress, in which case `None`
    /// is returned immediately.
    pub async fn try_sync(&self, cancel: &CancellationToken) -> Option<SyncOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            info!(operation = "sync", "Sync already running, skipping");
            return None;
        };

        self.set_state(SyncState::Syncing);
        let outcome = match self.run_pass(cancel).await {
            Ok(report) => {
                info!(
                    operation = "sync",
                    scenario = ?report.scenario,
                    uploaded = report.uploaded.len(),
                    downloaded = report.downloaded.len(),
                    skipped = report.skipped,
                    failed = report.failed.len(),
                    cancelled = report.cancelled,
                    "Sync finished"
                );
                SyncOutcome::Success(report)
            }
            Err(e) => {
                error!(operation = "sync", storage = self.storage.storage_name(), error = %e, "Sync failed");
                SyncOutcome::Error(e.to_string())
            }
        };

        if let Err(e) = self.preferences.set_last_sync(Utc::now()) {
            warn!(operation = "sync", error = %e, "Failed to record last sync time");
        }
        self.set_state(if outcome.is_success() {
            SyncState::Done
        } else {
            SyncState::Error
        });
        Some(outcome)
    }

    async fn scan_local(&self) -> Result<LocalInventory, StorageError> {
        let mut state = Vec::new();
        for name in &self.settings.state_files {
            let path = self.local_root.join(name);
            if let Some(modified) = modified_time(&path).await? {
                state.push(LocalFile {
                    relative: name.clone(),
                    path,
                    modified,
                });
            }
        }

        let mut images = HashMap::new();
        let images_root = self.local_root.join(&self.settings.images_dir);
        let mut entries = match tokio::fs::read_dir(&images_root).await {
            Ok(entries) => Some(entries),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        if let Some(entries) = entries.as_mut() {
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if !meta.is_file() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    warn!(path = %entry.path().display(), "Skipping image with non UTF-8 name");
                    continue;
                };
                if name.ends_with(".part") {
                    continue;
                }
                images.insert(
                    name.to_lowercase(),
                    LocalFile {
                        relative: self.settings.image_relative(&name),
                        path: entry.path(),
                        modified: DateTime::<Utc>::from(meta.modified()?),
                    },
                );
            }
        }

        Ok(LocalInventory { state, images })
    }

    /// Work out what a pass would do without transferring anything
    pub async fn plan(&self) -> Result<SyncPlan, StorageError> {
        let remote = self.storage.list_files(&self.settings.remote_root).await?;
        let local = self.scan_local().await?;
        let scenario = choose_scenario(local.is_empty(), remote.is_empty());
        debug!(operation = "sync", ?scenario, remote = remote.len(), "Planning sync");

        let plan = match scenario {
            SyncScenario::FirstUpload => self.plan_first_upload(local),
            SyncScenario::Restore => self.plan_restore(&remote),
            SyncScenario::TwoWay => self.plan_two_way(local, &remote),
        };
        Ok(plan)
    }

    fn upload_step(&self, file: LocalFile, is_image: bool) -> SyncStep {
        SyncStep {
            remote_path: self.settings.remote_path(&file.relative),
            relative: file.relative,
            transfer: Transfer::Upload,
            local_path: file.path,
            remote_modified: None,
            is_image,
        }
    }

    fn download_step(&self, remote_relative: &str, record: &RemoteFileRecord) -> SyncStep {
        let (relative, is_image) = self.settings.local_relative(remote_relative);
        SyncStep {
            local_path: self.local_root.join(&relative),
            relative,
            transfer: Transfer::Download,
            remote_path: record.path_display.clone(),
            remote_modified: Some(record.server_modified),
            is_image,
        }
    }

    fn sorted_images(images: HashMap<String, LocalFile>) -> Vec<LocalFile> {
        let mut images: Vec<LocalFile> = images.into_values().collect();
        images.sort_by(|a, b| compare_image_names(&a.relative, &b.relative));
        images
    }

    fn plan_first_upload(&self, local: LocalInventory) -> SyncPlan {
        let mut steps: Vec<SyncStep> = local
            .state
            .into_iter()
            .map(|file| self.upload_step(file, false))
            .collect();
        steps.extend(
            Self::sorted_images(local.images)
                .into_iter()
                .map(|file| self.upload_step(file, true)),
        );
        SyncPlan {
            scenario: SyncScenario::FirstUpload,
            steps,
            skipped: 0,
        }
    }

    fn is_state_file(&self, relative: &str) -> bool {
        self.settings
            .state_files
            .iter()
            .any(|name| name.eq_ignore_ascii_case(relative))
    }

    fn plan_restore(&self, remote: &[RemoteFileRecord]) -> SyncPlan {
        let mut state = Vec::new();
        let mut others = Vec::new();
        let mut skipped = 0;
        for record in remote {
            match self.settings.relative_of(record) {
                Some(relative) if self.is_state_file(&relative) => state.push((relative, record)),
                Some(relative) => others.push((relative, record)),
                None => {
                    warn!(path = %record.path_display, "Skipping remote file outside the sync root");
                    skipped += 1;
                }
            }
        }
        others.sort_by(|a, b| compare_image_names(&a.0, &b.0));

        let steps = state
            .into_iter()
            .chain(others)
            .map(|(relative, record)| self.download_step(&relative, record))
            .collect();
        SyncPlan {
            scenario: SyncScenario::Restore,
            steps,
            skipped,
        }
    }

    fn plan_two_way(&self, mut local: LocalInventory, remote: &[RemoteFileRecord]) -> SyncPlan {
        let mut steps = Vec::new();
        let mut skipped = 0;

        let mut remote_state: HashMap<String, &RemoteFileRecord> = HashMap::new();
        // Images are matched by lowercase file name only
        let mut remote_images: HashMap<String, (String, &RemoteFileRecord)> = HashMap::new();
        let images_prefix = format!("{}/", self.settings.images_dir.to_lowercase());
        for record in remote {
            let Some(relative) = self.settings.relative_of(record) else {
                continue;
            };
            let lower = relative.to_lowercase();
            if self.is_state_file(&relative) {
                remote_state.insert(lower, record);
            } else if let Some(name) = lower.strip_prefix(&images_prefix) {
                if !name.contains('/') {
                    remote_images.insert(name.to_string(), (relative, record));
                }
            }
        }

        for name in &self.settings.state_files {
            let local_file = local
                .state
                .iter()
                .position(|f| f.relative == *name)
                .map(|idx| local.state.swap_remove(idx));
            let remote_record = remote_state.get(&name.to_lowercase()).copied();

            let transfer = decide_transfer(
                local_file.as_ref().map(|f| f.modified),
                remote_record.map(|r| r.server_modified),
                self.settings.tolerance,
            );
            match (transfer, local_file, remote_record) {
                (Transfer::Upload, Some(file), _) => steps.push(self.upload_step(file, false)),
                (Transfer::Download, _, Some(record)) => steps.push(self.download_step(name, record)),
                _ => skipped += 1,
            }
        }

        let local_names: HashSet<String> = local.images.keys().cloned().collect();
        let mut missing_remote = HashMap::new();
        for (key, file) in local.images {
            if remote_images.contains_key(&key) {
                skipped += 1;
            } else {
                missing_remote.insert(key, file);
            }
        }
        steps.extend(
            Self::sorted_images(missing_remote)
                .into_iter()
                .map(|file| self.upload_step(file, true)),
        );

        let mut missing_local: Vec<(String, &RemoteFileRecord)> = remote_images
            .into_iter()
            .filter(|(key, _)| !local_names.contains(key))
            .map(|(_, entry)| entry)
            .collect();
        missing_local.sort_by(|a, b| compare_image_names(&a.0, &b.0));
        steps.extend(
            missing_local
                .into_iter()
                .map(|(relative, record)| self.download_step(&relative, record)),
        );

        SyncPlan {
            scenario: SyncScenario::TwoWay,
            steps,
            skipped,
        }
    }

    async fn run_pass(&self, cancel: &CancellationToken) -> Result<SyncReport, StorageError> {
        let plan = self.plan().await?;
        let mut report = SyncReport::new(plan.scenario);
        report.skipped = plan.skipped;
        info!(operation = "sync", scenario = ?plan.scenario, transfers = plan.steps.len(), "Starting sync");

        for step in plan.steps {
            if cancel.is_cancelled() {
                info!(operation = "sync", "Sync cancelled between files");
                report.cancelled = true;
                break;
            }

            match self.execute(&step).await {
                Ok(()) => match step.transfer {
                    Transfer::Upload => report.uploaded.push(step.relative),
                    Transfer::Download => report.downloaded.push(step.relative),
                    Transfer::Skip => report.skipped += 1,
                },
                Err(e) => {
                    warn!(
                        operation = "sync",
                        file = %step.relative,
                        transfer = ?step.transfer,
                        error = %e,
                        "File transfer failed, continuing"
                    );
                    report.failed.push(step.relative);
                }
            }
        }

        Ok(report)
    }

    async fn execute(&self, step: &SyncStep) -> Result<(), StorageError> {
        match step.transfer {
            Transfer::Upload => {
                let modified = modified_time(&step.local_path)
                    .await?
                    .unwrap_or_else(Utc::now);
                let record = self
                    .storage
                    .upload(&step.local_path, &step.remote_path, modified)
                    .await?;
                align_mtime(&step.local_path, record.server_modified);
                debug!(file = %step.relative, "Uploaded");
                if step.is_image && !self.settings.upload_pause.is_zero() {
                    tokio::time::sleep(self.settings.upload_pause).await;
                }
            }
            Transfer::Download => {
                self.storage.download(&step.remote_path, &step.local_path).await?;
                if let Some(modified) = step.remote_modified {
                    align_mtime(&step.local_path, modified);
                }
                debug!(file = %step.relative, "Downloaded");
            }
            Transfer::Skip => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
