pub mod library;
pub mod progress;
pub mod resolver;
pub mod update_scan;
pub mod image_order;
pub mod file_sync;
pub mod trigger;

pub use library::{LibraryError, LibraryStore, new_title_id};
pub use resolver::EpisodeResolver;
pub use update_scan::{ScanReport, UpdateScanner, build_candidate, dedupe_candidates};
pub use image_order::compare_image_names;
pub use file_sync::{FileSynchronizer, SyncPlan, SyncSettings, SyncStep, Transfer, choose_scenario, decide_transfer};
pub use trigger::SyncTrigger;
