pub mod config;
pub mod context;
pub mod daemon;
pub mod library;
pub mod lookup;
pub mod migrate;
pub mod prompts;
pub mod scan_ui;
pub mod sync;
pub mod updates;
