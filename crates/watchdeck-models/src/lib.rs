pub mod title;
pub mod content_type;
pub mod update;
pub mod remote;
pub mod sync_outcome;

pub use title::TrackedTitle;
pub use content_type::ContentType;
pub use update::{EpisodeFinding, EpisodeUpdateCandidate, IgnoredUpdates};
pub use remote::RemoteFileRecord;
pub use sync_outcome::{SyncOutcome, SyncReport, SyncScenario, SyncState};
