use super::*;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tempfile::TempDir;

/// In-memory remote keyed by lowercase path
#[derive(Default)]
struct FakeStorage {
    files: Mutex<BTreeMap<String, (RemoteFileRecord, Vec<u8>)>>,
    fail_paths: Mutex<HashSet<String>>,
    fail_listing: bool,
    uploads: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeStorage {
    fn put(&self, path: &str, body: &str, modified: DateTime<Utc>) {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        let record = RemoteFileRecord {
            name,
            path_lower: path.to_lowercase(),
            path_display: path.to_string(),
            server_modified: modified,
        };
        self.files
            .lock()
            .unwrap()
            .insert(path.to_lowercase(), (record, body.as_bytes().to_vec()));
    }

    fn fail_on(&self, path: &str) {
        self.fail_paths.lock().unwrap().insert(path.to_lowercase());
    }

    fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    fn check(&self, path: &str) -> Result<(), StorageError> {
        if self.fail_paths.lock().unwrap().contains(&path.to_lowercase()) {
            return Err(StorageError::Api {
                endpoint: "fake".to_string(),
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStorage for FakeStorage {
    fn storage_name(&self) -> &str {
        "fake"
    }

    async fn list_files(&self, root: &str) -> Result<Vec<RemoteFileRecord>, StorageError> {
        if self.fail_listing {
            return Err(StorageError::Auth("expired".to_string()));
        }
        let prefix = format!("{}/", root.to_lowercase());
        Ok(self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|(record, _)| record.path_lower.starts_with(&prefix))
            .map(|(record, _)| record.clone())
            .collect())
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        client_modified: DateTime<Utc>,
    ) -> Result<RemoteFileRecord, StorageError> {
        self.check(remote_path)?;
        let body = std::fs::read_to_string(local_path)?;
        self.put(remote_path, &body, client_modified);
        self.uploads.lock().unwrap().push(remote_path.to_string());
        let record = self.files.lock().unwrap()[&remote_path.to_lowercase()].0.clone();
        Ok(record)
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), StorageError> {
        self.check(remote_path)?;
        let body = self.files.lock().unwrap()[&remote_path.to_lowercase()].1.clone();
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(local_path, body)?;
        self.downloads.lock().unwrap().push(remote_path.to_string());
        Ok(())
    }

    async fn metadata(&self, remote_path: &str) -> Result<Option<RemoteFileRecord>, StorageError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(&remote_path.to_lowercase())
            .map(|(record, _)| record.clone()))
    }
}

fn settings() -> SyncSettings {
    let config = SyncConfig {
        remote_root: "/Library/".to_string(),
        upload_pause_ms: 0,
        ..SyncConfig::default()
    };
    SyncSettings::from_config(&config)
}

fn write_local(root: &Path, relative: &str, body: &str, modified: DateTime<Utc>) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, body).unwrap();
    align_mtime(&path, modified);
}

fn synchronizer(dir: &TempDir, storage: Arc<FakeStorage>) -> FileSynchronizer {
    let local_root = dir.path().join("library");
    std::fs::create_dir_all(&local_root).unwrap();
    let preferences = Arc::new(PreferencesStore::load(dir.path().join("preferences.toml")).unwrap());
    FileSynchronizer::new(storage, local_root, settings(), preferences)
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

async fn sync_report(sync: &FileSynchronizer) -> SyncReport {
    match sync.try_sync(&CancellationToken::new()).await {
        Some(SyncOutcome::Success(report)) => report,
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_choose_scenario() {
    assert_eq!(choose_scenario(false, true), SyncScenario::FirstUpload);
    assert_eq!(choose_scenario(true, false), SyncScenario::Restore);
    assert_eq!(choose_scenario(false, false), SyncScenario::TwoWay);
    assert_eq!(choose_scenario(true, true), SyncScenario::TwoWay);
}

#[test]
fn test_tolerance_band_is_exclusive() {
    let tolerance = Duration::milliseconds(5000);
    let local = at(0);
    assert_eq!(
        decide_transfer(Some(local), Some(local + Duration::milliseconds(5000)), tolerance),
        Transfer::Skip
    );
    assert_eq!(
        decide_transfer(Some(local), Some(local + Duration::milliseconds(5001)), tolerance),
        Transfer::Download
    );
    assert_eq!(
        decide_transfer(Some(local + Duration::milliseconds(5001)), Some(local), tolerance),
        Transfer::Upload
    );
    assert_eq!(
        decide_transfer(Some(local + Duration::milliseconds(5000)), Some(local), tolerance),
        Transfer::Skip
    );
}

#[test]
fn test_one_sided_files() {
    let tolerance = Duration::milliseconds(5000);
    assert_eq!(decide_transfer(Some(at(0)), None, tolerance), Transfer::Upload);
    assert_eq!(decide_transfer(None, Some(at(0)), tolerance), Transfer::Download);
    assert_eq!(decide_transfer(None, None, tolerance), Transfer::Skip);
}

#[test]
fn test_remote_root_normalization() {
    assert_eq!(normalize_remote_root(""), "");
    assert_eq!(normalize_remote_root("/"), "");
    assert_eq!(normalize_remote_root("Library/"), "/Library");
    assert_eq!(settings().remote_path("titles.json"), "/Library/titles.json");
}

#[test]
fn test_relative_path_rejects_escapes() {
    let s = settings();
    let record = |path: &str| RemoteFileRecord {
        name: String::new(),
        path_lower: path.to_lowercase(),
        path_display: path.to_string(),
        server_modified: at(0),
    };
    assert_eq!(s.relative_of(&record("/library/Images/1.jpg")).as_deref(), Some("Images/1.jpg"));
    assert_eq!(s.relative_of(&record("/Other/1.jpg")), None);
    assert_eq!(s.relative_of(&record("/Library/../etc/passwd")), None);
}

#[tokio::test]
async fn test_first_upload_sends_json_then_images_in_numeric_order() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage::default());
    let sync = synchronizer(&dir, storage.clone());
    let root = dir.path().join("library");
    write_local(&root, "titles.json", "[]", at(0));
    for name in ["10.jpg", "2.jpg", "1.jpg"] {
        write_local(&root, &format!("images/{name}"), "img", at(0));
    }

    let report = sync_report(&sync).await;
    assert_eq!(report.scenario, SyncScenario::FirstUpload);
    assert_eq!(
        storage.uploads(),
        vec![
            "/Library/titles.json",
            "/Library/images/1.jpg",
            "/Library/images/2.jpg",
            "/Library/images/10.jpg"
        ]
    );
    assert!(storage.downloads().is_empty());
    assert_eq!(sync.state(), SyncState::Done);
    assert!(sync.last_sync().is_some());
}

#[tokio::test]
async fn test_restore_downloads_everything() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage::default());
    storage.put("/Library/titles.json", r#"[{"id":"a"}]"#, at(0));
    storage.put("/Library/images/3.jpg", "img", at(0));
    let sync = synchronizer(&dir, storage.clone());

    let report = sync_report(&sync).await;
    assert_eq!(report.scenario, SyncScenario::Restore);
    assert_eq!(report.downloaded, vec!["titles.json", "images/3.jpg"]);

    let root = dir.path().join("library");
    assert_eq!(std::fs::read_to_string(root.join("titles.json")).unwrap(), r#"[{"id":"a"}]"#);
    assert!(root.join("images/3.jpg").exists());
    assert!(storage.uploads().is_empty());
}

#[tokio::test]
async fn test_restore_uses_configured_names_for_differently_cased_remote_paths() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage::default());
    storage.put("/Library/Titles.JSON", "[]", at(0));
    storage.put("/Library/Images/4.JPG", "img", at(0));
    let sync = synchronizer(&dir, storage.clone());

    let report = sync_report(&sync).await;
    assert_eq!(report.scenario, SyncScenario::Restore);
    assert_eq!(report.downloaded, vec!["titles.json", "images/4.JPG"]);

    let root = dir.path().join("library");
    assert!(root.join("titles.json").exists());
    assert!(root.join("images/4.JPG").exists());
    assert!(!root.join("Images").exists());
}

#[tokio::test]
async fn test_image_from_differently_cased_remote_folder_lands_in_images_dir() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage::default());
    let root = dir.path().join("library");
    write_local(&root, "titles.json", "[]", at(0));
    storage.put("/Library/Images/3.jpg", "img", at(0));
    let sync = synchronizer(&dir, storage.clone());

    let first = sync_report(&sync).await;
    assert_eq!(first.scenario, SyncScenario::TwoWay);
    assert_eq!(first.downloaded, vec!["images/3.jpg"]);
    assert!(root.join("images/3.jpg").exists());
    assert!(!root.join("Images").exists());

    let second = sync_report(&sync).await;
    assert!(second.downloaded.is_empty());
    assert!(second.uploaded.is_empty());
}

#[tokio::test]
async fn test_two_way_uses_tolerance_and_name_presence() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage::default());
    let root = dir.path().join("library");

    // Remote newer beyond tolerance
    write_local(&root, "titles.json", "local", at(0));
    storage.put("/Library/titles.json", "remote", at(6));
    // Within tolerance
    write_local(&root, "pending_updates.json", "[]", at(0));
    storage.put("/Library/pending_updates.json", "[]", at(5));
    // Only local
    write_local(&root, "ignored_updates.json", "{}", at(0));

    write_local(&root, "images/1.jpg", "img", at(0));
    write_local(&root, "images/2.JPG", "img", at(0));
    storage.put("/Library/images/2.jpg", "img", at(100));
    storage.put("/Library/images/3.jpg", "img", at(0));

    let sync = synchronizer(&dir, storage.clone());
    let report = sync_report(&sync).await;

    assert_eq!(report.scenario, SyncScenario::TwoWay);
    assert_eq!(report.downloaded, vec!["titles.json", "images/3.jpg"]);
    assert_eq!(report.uploaded, vec!["ignored_updates.json", "images/1.jpg"]);
    assert_eq!(report.skipped, 2);
    assert!(report.failed.is_empty());
    assert_eq!(std::fs::read_to_string(root.join("titles.json")).unwrap(), "remote");
}

#[tokio::test]
async fn test_downloaded_file_is_not_transferred_again() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage::default());
    let root = dir.path().join("library");
    write_local(&root, "titles.json", "local", at(0));
    storage.put("/Library/titles.json", "remote", at(60));
    let sync = synchronizer(&dir, storage.clone());

    sync_report(&sync).await;
    let second = sync_report(&sync).await;
    assert!(second.downloaded.is_empty());
    assert!(second.uploaded.is_empty());
}

#[tokio::test]
async fn test_single_file_failure_does_not_abort_pass() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage::default());
    storage.fail_on("/Library/images/2.jpg");
    let root = dir.path().join("library");
    write_local(&root, "titles.json", "[]", at(0));
    for name in ["1.jpg", "2.jpg", "3.jpg"] {
        write_local(&root, &format!("images/{name}"), "img", at(0));
    }
    let sync = synchronizer(&dir, storage.clone());

    let report = sync_report(&sync).await;
    assert_eq!(report.failed, vec!["images/2.jpg"]);
    assert_eq!(report.uploaded, vec!["titles.json", "images/1.jpg", "images/3.jpg"]);
    assert_eq!(sync.state(), SyncState::Done);
}

#[tokio::test]
async fn test_listing_failure_is_an_error_and_records_last_sync() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage {
        fail_listing: true,
        ..FakeStorage::default()
    });
    let sync = synchronizer(&dir, storage);

    let outcome = sync.try_sync(&CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Error(ref msg) if msg.contains("expired")));
    assert_eq!(sync.state(), SyncState::Error);
    assert!(sync.last_sync().is_some());
}

#[tokio::test]
async fn test_cancelled_before_first_file() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage::default());
    let root = dir.path().join("library");
    write_local(&root, "titles.json", "[]", at(0));
    let sync = synchronizer(&dir, storage.clone());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = sync.try_sync(&cancel).await.unwrap();
    match outcome {
        SyncOutcome::Success(report) => {
            assert!(report.cancelled);
            assert!(report.uploaded.is_empty());
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(storage.uploads().is_empty());
}

#[tokio::test]
async fn test_overlapping_sync_is_rejected() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage::default());
    let sync = synchronizer(&dir, storage);

    let _held = sync.in_flight.try_lock().unwrap();
    assert!(sync.try_sync(&CancellationToken::new()).await.is_none());
    assert_eq!(sync.state(), SyncState::Idle);
}

#[tokio::test]
async fn test_plan_does_not_transfer() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FakeStorage::default());
    let root = dir.path().join("library");
    write_local(&root, "titles.json", "[]", at(0));
    let sync = synchronizer(&dir, storage.clone());

    let plan = sync.plan().await.unwrap();
    assert_eq!(plan.scenario, SyncScenario::FirstUpload);
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(plan.steps[0].transfer, Transfer::Upload);
    assert!(storage.uploads().is_empty());
}
