use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncScenario {
    /// Remote is empty, push everything local
    FirstUpload,
    /// Local is empty, pull everything remote
    Restore,
    TwoWay,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncReport {
    pub scenario: SyncScenario,
    pub uploaded: Vec<String>,
    pub downloaded: Vec<String>,
    pub skipped: usize,
    pub failed: Vec<String>,
    pub cancelled: bool,
}

impl SyncReport {
    pub fn new(scenario: SyncScenario) -> Self {
        Self {
            scenario,
            uploaded: Vec::new(),
            downloaded: Vec::new(),
            skipped: 0,
            failed: Vec::new(),
            cancelled: false,
        }
    }
}

/// Result of one synchronizer invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncOutcome {
    Success(SyncReport),
    Error(String),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success(_))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Done,
    Error,
}
