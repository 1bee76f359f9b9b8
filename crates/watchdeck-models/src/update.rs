use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Episode count reported by a provider for one title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpisodeFinding {
    pub episode_count: u32,
    pub source_name: String,
}

impl EpisodeFinding {
    pub fn new(episode_count: u32, source_name: impl Into<String>) -> Self {
        Self {
            episode_count,
            source_name: source_name.into(),
        }
    }
}

/// A proposed episode-count bump waiting for the user to accept or dismiss it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeUpdateCandidate {
    pub title_id: String,
    pub title: String,
    pub current_episode_count: u32,
    pub proposed_episode_count: u32,
    pub source_name: String,
}

impl EpisodeUpdateCandidate {
    /// Dedup key used when a scan is rerun
    pub fn key(&self) -> (&str, u32) {
        (self.title_id.as_str(), self.proposed_episode_count)
    }
}

/// Per-title episode counts the user has dismissed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct IgnoredUpdates {
    marks: HashMap<String, u32>,
}

impl IgnoredUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(&mut self, title_id: impl Into<String>, episode_count: u32) {
        self.marks.insert(title_id.into(), episode_count);
    }

    /// True only when the exact count was dismissed for this title
    pub fn is_ignored(&self, title_id: &str, episode_count: u32) -> bool {
        self.marks.get(title_id) == Some(&episode_count)
    }

    pub fn get(&self, title_id: &str) -> Option<u32> {
        self.marks.get(title_id).copied()
    }

    pub fn remove(&mut self, title_id: &str) -> Option<u32> {
        self.marks.remove(title_id)
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignored_matches_exact_count_only() {
        let mut ignored = IgnoredUpdates::new();
        ignored.ignore("t1", 12);
        assert!(ignored.is_ignored("t1", 12));
        assert!(!ignored.is_ignored("t1", 13));
        assert!(!ignored.is_ignored("t2", 12));

        // A later dismissal replaces the earlier mark
        ignored.ignore("t1", 13);
        assert!(!ignored.is_ignored("t1", 12));
        assert_eq!(ignored.get("t1"), Some(13));
    }

    #[test]
    fn test_ignored_serializes_as_plain_map() {
        let mut ignored = IgnoredUpdates::new();
        ignored.ignore("t1", 4);
        let json = serde_json::to_string(&ignored).unwrap();
        assert_eq!(json, r#"{"t1":4}"#);
    }
}
