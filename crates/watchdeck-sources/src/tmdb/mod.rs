//! TMDB lookup for movies and series: search, then sum season episode counts.

pub mod api;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use watchdeck_models::EpisodeFinding;
use crate::error::SourceError;
use crate::rate_limiter::RateLimiter;
use crate::title_match::any_similar;
use crate::traits::EpisodeSource;
use api::{Season, TvDetails, TvSearchResponse, TvSearchResult};

const PROVIDER: &str = "TMDB";

pub struct TmdbSource {
    client: Client,
    limiter: Arc<RateLimiter>,
    api_key: String,
    language: String,
}

impl TmdbSource {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, api_key: String, language: String) -> Self {
        Self {
            client,
            limiter,
            api_key,
            language,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, SourceError> {
        let url = format!("{}{}", api::API_BASE, path);
        let request = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", self.language.as_str())])
            .query(query);

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
                serde_json::from_str(&text).map_err(|e| SourceError::Decode {
                    provider: PROVIDER,
                    message: e.to_string(),
                })
            })
            .await
    }

    async fn search_tv(&self, title: &str) -> Result<Option<TvSearchResult>, SourceError> {
        let response: TvSearchResponse = self.get_json("/search/tv", &[("query", title)]).await?;
        Ok(response.results.into_iter().next())
    }

    async fn tv_details(&self, id: u64) -> Result<TvDetails, SourceError> {
        self.get_json(&format!("/tv/{}", id), &[]).await
    }
}

pub(crate) fn result_matches(query: &str, result: &TvSearchResult) -> bool {
    any_similar(query, [result.original_name.as_deref(), result.name.as_deref()])
}

/// Sum regular seasons. Season 0 ("Specials") only counts when it is the only season listed.
pub(crate) fn total_episodes(seasons: &[Season]) -> Option<u32> {
    let only_specials = seasons.len() == 1 && seasons[0].season_number == 0;

    let total: i64 = seasons
        .iter()
        .filter(|s| s.season_number > 0 || only_specials)
        .map(|s| s.episode_count.max(0))
        .sum();

    u32::try_from(total).ok().filter(|t| *t > 0)
}

#[async_trait]
impl EpisodeSource for TmdbSource {
    fn source_name(&self) -> &str {
        PROVIDER
    }

    async fn try_resolve(&self, title: &str) -> Result<Option<EpisodeFinding>, SourceError> {
        if self.api_key.is_empty() {
            return Err(SourceError::NotConfigured(PROVIDER));
        }

        let Some(result) = self.search_tv(title).await? else {
            debug!(provider = PROVIDER, title, "No TMDB result");
            return Ok(None);
        };
        if !result_matches(title, &result) {
            debug!(provider = PROVIDER, title, tmdb_id = result.id, "TMDB result rejected");
            return Ok(None);
        }

        let details = self.tv_details(result.id).await?;
        Ok(total_episodes(&details.seasons).map(|count| EpisodeFinding::new(count, PROVIDER)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seasons(json: &str) -> Vec<Season> {
        serde_json::from_str::<TvDetails>(json).unwrap().seasons
    }

    #[test]
    fn test_specials_are_excluded_when_regular_seasons_exist() {
        let s = seasons(r#"{"seasons":[{"season_number":0,"episode_count":5},{"season_number":1,"episode_count":10},{"season_number":2,"episode_count":12}]}"#);
        assert_eq!(total_episodes(&s), Some(22));
    }

    #[test]
    fn test_only_specials_season_counts() {
        let s = seasons(r#"{"seasons":[{"season_number":0,"episode_count":3}]}"#);
        assert_eq!(total_episodes(&s), Some(3));
    }

    #[test]
    fn test_no_episodes_discarded() {
        assert_eq!(total_episodes(&[]), None);
        let s = seasons(r#"{"seasons":[{"season_number":1,"episode_count":0}]}"#);
        assert_eq!(total_episodes(&s), None);
    }

    #[test]
    fn test_result_matches_original_or_localized_name() {
        let response: TvSearchResponse = serde_json::from_str(
            r#"{"page":1,"results":[{"id":1396,"name":"Breaking Bad","original_name":"Breaking Bad"}]}"#,
        )
        .unwrap();
        assert!(result_matches("breaking bad", &response.results[0]));
        assert!(!result_matches("Better Call Saul", &response.results[0]));
    }
}
