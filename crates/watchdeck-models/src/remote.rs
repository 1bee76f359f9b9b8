use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one remote file, only valid for the sync pass that listed it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteFileRecord {
    pub name: String,
    pub path_lower: String,
    pub path_display: String,
    pub server_modified: DateTime<Utc>,
}
