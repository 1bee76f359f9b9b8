pub mod traits;
pub mod error;
pub mod http;
pub mod rate_limiter;
pub mod title_match;
pub mod factory;
pub mod anilist;
pub mod shikimori;
pub mod jikan;
pub mod tmdb;
pub mod dropbox;

pub use traits::{EpisodeSource, RemoteStorage};
pub use error::{SourceError, StorageError};
pub use rate_limiter::RateLimiter;
pub use title_match::{is_similar, normalize};
pub use factory::{ProviderChains, ProviderRegistry};
pub use dropbox::DropboxClient;
