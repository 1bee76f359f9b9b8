use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};
use watchdeck_models::{EpisodeUpdateCandidate, IgnoredUpdates, TrackedTitle};

pub const TITLES_FILE: &str = "titles.json";
pub const PENDING_FILE: &str = "pending_updates.json";
pub const IGNORED_FILE: &str = "ignored_updates.json";
pub const LEGACY_FILE: &str = "anime_list.json";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("library file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no tracked title with id {0}")]
    TitleNotFound(String),
    #[error("no pending update for title {0}")]
    NoPendingUpdate(String),
}

type Result<T> = std::result::Result<T, LibraryError>;

pub fn new_title_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// JSON-file persistence for the library: tracked titles, pending updates and ignored marks.
///
/// Every mutation is a read-modify-write under one lock and lands on disk via
/// temp file + rename, so a scan replacing the pending list and a user
/// accepting an update cannot lose each other's writes.
pub struct LibraryStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LibraryStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| LibraryError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data lives on disk, so a poisoned lock carries no torn state
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_json<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T> {
        let path = self.root.join(file);
        if !path.exists() {
            debug!("Library file {} does not exist yet", file);
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| LibraryError::Io {
            path: path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&content).map_err(|source| LibraryError::Json { path, source })
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.root.join(file);
        let json = serde_json::to_string_pretty(value).map_err(|source| LibraryError::Json {
            path: path.clone(),
            source,
        })?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, json).map_err(|source| LibraryError::Io {
            path: temp_path.clone(),
            source,
        })?;
        std::fs::rename(&temp_path, &path).map_err(|source| LibraryError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Titles sorted by `order_index`
    pub fn load_titles(&self) -> Result<Vec<TrackedTitle>> {
        let mut titles: Vec<TrackedTitle> = self.read_json(TITLES_FILE)?;
        titles.sort_by_key(|t| t.order_index);
        Ok(titles)
    }

    pub fn save_titles(&self, titles: &[TrackedTitle]) -> Result<()> {
        let _guard = self.lock();
        self.write_json(TITLES_FILE, titles)
    }

    pub fn load_pending(&self) -> Result<Vec<EpisodeUpdateCandidate>> {
        self.read_json(PENDING_FILE)
    }

    pub fn load_ignored(&self) -> Result<IgnoredUpdates> {
        self.read_json(IGNORED_FILE)
    }

    pub fn get_title(&self, id: &str) -> Result<TrackedTitle> {
        self.load_titles()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| LibraryError::TitleNotFound(id.to_string()))
    }

    /// Append a title at the end of the ordering
    pub fn add_title(&self, mut title: TrackedTitle) -> Result<TrackedTitle> {
        let _guard = self.lock();
        let mut titles = self.load_titles()?;
        title.order_index = titles.iter().map(|t| t.order_index + 1).max().unwrap_or(0);
        titles.push(title.clone());
        self.write_json(TITLES_FILE, &titles)?;
        info!(title_id = %title.id, title = %title.title, "Added title");
        Ok(title)
    }

    /// Apply `edit` to one title atomically and return the updated copy
    pub fn update_title<F>(&self, id: &str, edit: F) -> Result<TrackedTitle>
    where
        F: FnOnce(&mut TrackedTitle),
    {
        let _guard = self.lock();
        let mut titles = self.load_titles()?;
        let title = titles
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| LibraryError::TitleNotFound(id.to_string()))?;
        edit(title);
        let updated = title.clone();
        self.write_json(TITLES_FILE, &titles)?;
        Ok(updated)
    }

    /// Remove a title together with its pending update and ignored mark
    pub fn remove_title(&self, id: &str) -> Result<TrackedTitle> {
        let _guard = self.lock();
        let mut titles = self.load_titles()?;
        let index = titles
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| LibraryError::TitleNotFound(id.to_string()))?;
        let removed = titles.remove(index);
        self.write_json(TITLES_FILE, &titles)?;

        let mut pending = self.load_pending()?;
        let before = pending.len();
        pending.retain(|c| c.title_id != id);
        if pending.len() != before {
            self.write_json(PENDING_FILE, &pending)?;
        }

        let mut ignored = self.load_ignored()?;
        if ignored.remove(id).is_some() {
            self.write_json(IGNORED_FILE, &ignored)?;
        }

        Ok(removed)
    }

    /// Replace the whole pending list with the result of a scan.
    ///
    /// Candidates are re-checked against the titles and ignored marks as they
    /// are on disk now, since the user may have accepted, dismissed or deleted
    /// something while the scan was running.
    pub fn replace_pending(&self, candidates: Vec<EpisodeUpdateCandidate>) -> Result<Vec<EpisodeUpdateCandidate>> {
        let _guard = self.lock();
        let titles = self.load_titles()?;
        let ignored = self.load_ignored()?;

        let fresh: Vec<EpisodeUpdateCandidate> = candidates
            .into_iter()
            .filter_map(|mut candidate| {
                let title = titles.iter().find(|t| t.id == candidate.title_id)?;
                if candidate.proposed_episode_count <= title.episode_count
                    || ignored.is_ignored(&candidate.title_id, candidate.proposed_episode_count)
                {
                    return None;
                }
                candidate.current_episode_count = title.episode_count;
                candidate.title = title.title.clone();
                Some(candidate)
            })
            .collect();

        self.write_json(PENDING_FILE, &fresh)?;
        Ok(fresh)
    }

    /// Apply the pending update for `title_id` and drop it from the list
    pub fn accept_update(&self, title_id: &str) -> Result<TrackedTitle> {
        let _guard = self.lock();
        let mut pending = self.load_pending()?;
        let index = pending
            .iter()
            .position(|c| c.title_id == title_id)
            .ok_or_else(|| LibraryError::NoPendingUpdate(title_id.to_string()))?;
        let candidate = pending.remove(index);

        let mut titles = self.load_titles()?;
        let title = titles
            .iter_mut()
            .find(|t| t.id == title_id)
            .ok_or_else(|| LibraryError::TitleNotFound(title_id.to_string()))?;
        // Never move progress backwards if the title was edited since the scan
        title.episode_count = title.episode_count.max(candidate.proposed_episode_count);
        let updated = title.clone();

        self.write_json(TITLES_FILE, &titles)?;
        self.write_json(PENDING_FILE, &pending)?;
        info!(
            title_id,
            episode_count = updated.episode_count,
            source = %candidate.source_name,
            "Accepted episode update"
        );
        Ok(updated)
    }

    /// Remember the proposed count as ignored and drop the candidate; the title is untouched
    pub fn dismiss_update(&self, title_id: &str) -> Result<EpisodeUpdateCandidate> {
        let _guard = self.lock();
        let mut pending = self.load_pending()?;
        let index = pending
            .iter()
            .position(|c| c.title_id == title_id)
            .ok_or_else(|| LibraryError::NoPendingUpdate(title_id.to_string()))?;
        let candidate = pending.remove(index);

        let mut ignored = self.load_ignored()?;
        ignored.ignore(candidate.title_id.clone(), candidate.proposed_episode_count);

        self.write_json(IGNORED_FILE, &ignored)?;
        self.write_json(PENDING_FILE, &pending)?;
        info!(
            title_id,
            episode_count = candidate.proposed_episode_count,
            "Dismissed episode update"
        );
        Ok(candidate)
    }

    /// One-time import of the legacy `anime_list.json` into `titles.json`.
    ///
    /// Entries whose title already exists (case-insensitive) are skipped. The
    /// legacy file is renamed to `*.migrated` afterwards. Returns the number
    /// of imported titles; 0 when there is no legacy file.
    pub fn migrate_legacy(&self) -> Result<usize> {
        let legacy_path = self.root.join(LEGACY_FILE);
        if !legacy_path.exists() {
            return Ok(0);
        }

        let _guard = self.lock();
        let legacy: Vec<LegacyEntry> = self.read_json(LEGACY_FILE)?;
        let mut titles = self.load_titles()?;
        let mut next_index = titles.iter().map(|t| t.order_index + 1).max().unwrap_or(0);
        let mut imported = 0;

        for entry in legacy {
            let name = entry.title.trim();
            if name.is_empty() {
                warn!("Skipping legacy entry without a title");
                continue;
            }
            if titles.iter().any(|t| t.title.eq_ignore_ascii_case(name)) {
                debug!(title = name, "Legacy title already present");
                continue;
            }

            let mut title = TrackedTitle::new(new_title_id(), name, "ANIME");
            title.episode_count = entry.episodes;
            title.set_rating(entry.rating);
            title.image_reference = entry.image.filter(|i| !i.is_empty());
            title.order_index = next_index;
            title.date_added = Utc::now();
            next_index += 1;
            titles.push(title);
            imported += 1;
        }

        self.write_json(TITLES_FILE, &titles)?;
        let migrated_path = legacy_path.with_extension("json.migrated");
        std::fs::rename(&legacy_path, &migrated_path).map_err(|source| LibraryError::Io {
            path: legacy_path.clone(),
            source,
        })?;

        info!(imported, "Migrated legacy library");
        Ok(imported)
    }
}

/// Record shape written by older app versions
#[derive(Debug, Deserialize)]
struct LegacyEntry {
    title: String,
    #[serde(default, alias = "episodeCount", alias = "episode")]
    episodes: u32,
    #[serde(default)]
    rating: u8,
    #[serde(default, alias = "imagePath", alias = "imageUri")]
    image: Option<String>,
}
