use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use watchdeck_models::{EpisodeFinding, EpisodeUpdateCandidate, IgnoredUpdates, TrackedTitle};
use crate::library::{LibraryError, LibraryStore};
use crate::progress::ProgressTracker;
use crate::resolver::EpisodeResolver;

const PROGRESS_INTERVAL: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub checked: usize,
    /// Pending list as persisted after the scan
    pub candidates: Vec<EpisodeUpdateCandidate>,
    /// When set the pending list on disk was left as it was
    pub cancelled: bool,
}

/// A finding becomes a candidate only when it moves the count forward and the
/// user has not dismissed that exact count.
pub fn build_candidate(
    title: &TrackedTitle,
    finding: &EpisodeFinding,
    ignored: &IgnoredUpdates,
) -> Option<EpisodeUpdateCandidate> {
    if finding.episode_count <= title.episode_count {
        return None;
    }
    if ignored.is_ignored(&title.id, finding.episode_count) {
        debug!(title_id = %title.id, episode_count = finding.episode_count, "Update was dismissed earlier");
        return None;
    }
    Some(EpisodeUpdateCandidate {
        title_id: title.id.clone(),
        title: title.title.clone(),
        current_episode_count: title.episode_count,
        proposed_episode_count: finding.episode_count,
        source_name: finding.source_name.clone(),
    })
}

/// Drop repeated `(title_id, proposed)` pairs, keeping first occurrence order
pub fn dedupe_candidates(candidates: Vec<EpisodeUpdateCandidate>) -> Vec<EpisodeUpdateCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert((c.title_id.clone(), c.proposed_episode_count)))
        .collect()
}

/// Runs the resolver over the whole library and replaces the pending update list.
pub struct UpdateScanner {
    resolver: Arc<EpisodeResolver>,
    store: Arc<LibraryStore>,
}

impl UpdateScanner {
    pub fn new(resolver: Arc<EpisodeResolver>, store: Arc<LibraryStore>) -> Self {
        Self { resolver, store }
    }

    /// Scan every tracked title.
    ///
    /// `progress` is called after each title with `(done, total, title)`.
    /// Cancellation is checked between titles; a cancelled scan keeps the
    /// previously persisted pending list. Errors are persistence failures only.
    pub async fn run<P>(&self, cancel: &CancellationToken, mut progress: P) -> Result<ScanReport, LibraryError>
    where
        P: FnMut(usize, usize, &str) + Send,
    {
        let titles = self.store.load_titles()?;
        let ignored = self.store.load_ignored()?;
        let total = titles.len();
        let mut tracker = ProgressTracker::new(total, PROGRESS_INTERVAL);
        let mut found = Vec::new();

        for (idx, title) in titles.iter().enumerate() {
            if cancel.is_cancelled() {
                tracker.log_summary(true);
                return Ok(ScanReport {
                    checked: idx,
                    candidates: self.store.load_pending()?,
                    cancelled: true,
                });
            }

            let finding = self
                .resolver
                .find_total_episodes(&title.title, &title.category_type, title.content_type())
                .await;

            match finding {
                Some(finding) => match build_candidate(title, &finding, &ignored) {
                    Some(candidate) => {
                        tracker.record_update();
                        found.push(candidate);
                    }
                    None => tracker.record_up_to_date(),
                },
                None => tracker.record_no_result(),
            }

            tracker.log_progress(idx + 1);
            progress(idx + 1, total, &title.title);
        }

        tracker.log_summary(false);

        let candidates = match self.store.replace_pending(dedupe_candidates(found)) {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(operation = "update_scan", error = %e, "Failed to persist pending updates");
                return Err(e);
            }
        };
        info!(operation = "update_scan", pending = candidates.len(), "Pending updates replaced");

        Ok(ScanReport {
            checked: total,
            candidates,
            cancelled: false,
        })
    }
}
