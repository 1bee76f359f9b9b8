//! Builds the provider chains and the storage client from configuration.
//!
//! This is the only place that knows provider priority, so reordering or
//! removing a provider never touches the resolver.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use watchdeck_config::{Config, CredentialStore};
use watchdeck_models::ContentType;
use crate::anilist::AniListSource;
use crate::dropbox::{DropboxAuth, DropboxClient};
use crate::http::create_http_client;
use crate::jikan::JikanSource;
use crate::rate_limiter::RateLimiter;
use crate::shikimori::ShikimoriSource;
use crate::tmdb::TmdbSource;
use crate::traits::EpisodeSource;

/// Ordered provider lists per content type; first hit wins
#[derive(Clone, Default)]
pub struct ProviderChains {
    pub anime: Vec<Arc<dyn EpisodeSource>>,
    pub movie_or_series: Vec<Arc<dyn EpisodeSource>>,
}

impl ProviderChains {
    pub fn for_content(&self, content_type: ContentType) -> &[Arc<dyn EpisodeSource>] {
        match content_type {
            ContentType::Anime => &self.anime,
            ContentType::MovieOrSeries => &self.movie_or_series,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anime.is_empty() && self.movie_or_series.is_empty()
    }
}

pub struct ProviderRegistry {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
}

impl ProviderRegistry {
    /// One HTTP client and one rate limiter shared by every provider
    pub fn new(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.providers.request_timeout_secs);
        Self {
            client: create_http_client(timeout),
            limiter: Arc::new(RateLimiter::new(Duration::from_millis(
                config.providers.rate_limit_delay_ms,
            ))),
        }
    }

    pub fn build_chains(&self, config: &Config, credentials: &CredentialStore) -> ProviderChains {
        let providers = &config.providers;
        let mut chains = ProviderChains::default();

        if providers.anilist {
            chains.anime.push(Arc::new(AniListSource::new(self.client.clone())));
        }
        if providers.shikimori {
            chains
                .anime
                .push(Arc::new(ShikimoriSource::new(self.client.clone(), self.limiter.clone())));
        }
        if providers.jikan {
            chains
                .anime
                .push(Arc::new(JikanSource::new(self.client.clone(), self.limiter.clone())));
        }

        if providers.tmdb {
            match credentials.get_tmdb_api_key() {
                Some(api_key) => chains.movie_or_series.push(Arc::new(TmdbSource::new(
                    self.client.clone(),
                    self.limiter.clone(),
                    api_key.clone(),
                    providers.tmdb_language.clone(),
                ))),
                None => warn!("TMDB is enabled but no API key is stored; movies and series will not be checked"),
            }
        }

        info!(
            anime = chains.anime.len(),
            movie_or_series = chains.movie_or_series.len(),
            "Built provider chains"
        );
        chains
    }

    /// Returns None when no Dropbox credentials are stored
    pub fn build_dropbox(&self, credentials: &CredentialStore) -> Option<DropboxClient> {
        // Transfers can be slow, so storage gets its own client without the provider timeout
        let client = create_http_client(Duration::from_secs(300));

        let auth = match (
            credentials.get_dropbox_app_key(),
            credentials.get_dropbox_refresh_token(),
            credentials.get_dropbox_access_token(),
        ) {
            (Some(app_key), Some(refresh_token), _) => DropboxAuth::Refresh {
                app_key: app_key.clone(),
                refresh_token: refresh_token.clone(),
            },
            (_, _, Some(token)) => DropboxAuth::AccessToken(token.clone()),
            _ => return None,
        };

        Some(DropboxClient::new(client, auth))
    }
}
