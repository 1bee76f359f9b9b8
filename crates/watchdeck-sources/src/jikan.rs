//! Jikan (MyAnimeList mirror) REST lookup (rate-limited).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use watchdeck_models::EpisodeFinding;
use crate::error::SourceError;
use crate::rate_limiter::RateLimiter;
use crate::title_match::any_similar;
use crate::traits::EpisodeSource;

const API_BASE: &str = "https://api.jikan.moe/v4";
const PROVIDER: &str = "Jikan";

#[derive(Debug, Deserialize)]
pub struct JikanSearchResponse {
    #[serde(default)]
    pub data: Vec<JikanAnime>,
}

#[derive(Debug, Deserialize)]
pub struct JikanAnime {
    pub title: Option<String>,
    pub title_english: Option<String>,
    pub episodes: Option<i64>,
}

pub struct JikanSource {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl JikanSource {
    pub fn new(client: Client, limiter: Arc<RateLimiter>) -> Self {
        Self { client, limiter }
    }

    async fn search(&self, title: &str) -> Result<JikanSearchResponse, SourceError> {
        let url = format!("{}/anime", API_BASE);
        let request = self.client.get(&url).query(&[("q", title), ("limit", "1")]);

        self.limiter
            .execute_safe(|| async move {
                let response = request
                    .send()
                    .await
                    .map_err(|source| SourceError::Http { provider: PROVIDER, source })?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(SourceError::Status {
                        provider: PROVIDER,
                        status: status.as_u16(),
                        body,
                    });
                }

                let text = response
                    .text()
                    .await
                    .map_err(|source| SourceError::Http { provider: PROVIDER, source })?;
                parse_response(&text)
            })
            .await
    }
}

fn parse_response(text: &str) -> Result<JikanSearchResponse, SourceError> {
    serde_json::from_str(text).map_err(|e| SourceError::Decode {
        provider: PROVIDER,
        message: e.to_string(),
    })
}

pub(crate) fn episodes_from_anime(query: &str, anime: &JikanAnime) -> Option<u32> {
    if !any_similar(query, [anime.title.as_deref(), anime.title_english.as_deref()]) {
        return None;
    }
    u32::try_from(anime.episodes?).ok().filter(|c| *c > 0)
}

#[async_trait]
impl EpisodeSource for JikanSource {
    fn source_name(&self) -> &str {
        PROVIDER
    }

    async fn try_resolve(&self, title: &str) -> Result<Option<EpisodeFinding>, SourceError> {
        let response = self.search(title).await?;
        let Some(anime) = response.data.first() else {
            debug!(provider = PROVIDER, title, "No Jikan result");
            return Ok(None);
        };

        Ok(episodes_from_anime(title, anime).map(|count| EpisodeFinding::new(count, PROVIDER)))
    }
}
