//! Shikimori REST lookup (rate-limited).

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

const API_BASE: &str = "https://shikimori.one/api";
const PROVIDER: &str = "Shikimori";

#[derive(Debug, Deserialize)]
pub struct ShikimoriAnime {
    pub name: Option<String>,
    pub russian: Option<String>,
    pub episodes: Option<i64>,
    pub episodes_aired: Option<i64>,
}

pub struct ShikimoriSource {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl ShikimoriSource {
    pub fn new(client: Client, limiter: Arc<RateLimiter>) -> Self {
        Self { client, limiter }
    }

    async fn search(&self, title: &str) -> Result<Vec<ShikimoriAnime>, SourceError> {
        let url = format!("{}/animes", API_BASE);
        let request = self
            .client
            .get(&url)
            .query(&[("search", title), ("limit", "1")]);

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

fn parse_response(text: &str) -> Result<Vec<ShikimoriAnime>, SourceError> {
    serde_json::from_str(text).map_err(|e| SourceError::Decode {
        provider: PROVIDER,
        message: e.to_string(),
    })
}

/// `episodes_aired` is 0 for finished shows, so fall back to `episodes` then
pub(crate) fn episodes_from_anime(query: &str, anime: &ShikimoriAnime) -> Option<u32> {
    if !any_similar(query, [anime.name.as_deref(), anime.russian.as_deref()]) {
        return None;
    }

    let count = anime
        .episodes_aired
        .filter(|aired| *aired > 0)
        .or(anime.episodes)?;

    u32::try_from(count).ok().filter(|c| *c > 0)
}

#[async_trait]
impl EpisodeSource for ShikimoriSource {
    fn source_name(&self) -> &str {
        PROVIDER
    }

    async fn try_resolve(&self, title: &str) -> Result<Option<EpisodeFinding>, SourceError> {
        let results = self.search(title).await?;
        let Some(anime) = results.first() else {
            debug!(provider = PROVIDER, title, "No Shikimori result");
            return Ok(None);
        };

        Ok(episodes_from_anime(title, anime).map(|count| EpisodeFinding::new(count, PROVIDER)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_aired_episodes() {
        let results = parse_response(
            r#"[{"id":52991,"name":"Sousou no Frieren","russian":"Провожающая в последний путь Фрирен","episodes":28,"episodes_aired":14}]"#,
        )
        .unwrap();
        assert_eq!(episodes_from_anime("Sousou no Frieren", &results[0]), Some(14));
    }

    #[test]
    fn test_finished_show_falls_back_to_total() {
        let results = parse_response(r#"[{"name":"Mushishi","russian":"Мастер Муси","episodes":26,"episodes_aired":0}]"#).unwrap();
        assert_eq!(episodes_from_anime("Mushishi", &results[0]), Some(26));
    }

    #[test]
    fn test_matches_russian_title() {
        let results = parse_response(r#"[{"name":"Mushi-shi","russian":"Мастер Муси","episodes":26,"episodes_aired":0}]"#).unwrap();
        assert_eq!(episodes_from_anime("Мастер Муси", &results[0]), Some(26));
    }

    #[test]
    fn test_zero_episodes_discarded() {
        let results = parse_response(r#"[{"name":"Announced Show","russian":null,"episodes":0,"episodes_aired":0}]"#).unwrap();
        assert_eq!(episodes_from_anime("Announced Show", &results[0]), None);
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        assert!(matches!(parse_response("{\"message\":\"oops\"}"), Err(SourceError::Decode { .. })));
    }
}
