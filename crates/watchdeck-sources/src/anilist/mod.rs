//! AniList GraphQL lookup. AniList is not throttled through the rate limiter.

pub mod api;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;
use watchdeck_models::EpisodeFinding;
use crate::error::SourceError;
use crate::title_match::any_similar;
use crate::traits::EpisodeSource;
use api::{GraphQlResponse, Media};

const PROVIDER: &str = "AniList";

pub struct AniListSource {
    client: Client,
}

impl AniListSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn search(&self, title: &str) -> Result<Option<Media>, SourceError> {
        let body = json!({
            "query": api::SEARCH_QUERY,
            "variables": { "search": title },
        });

        let response = self
            .client
            .post(api::API_URL)
            .json(&body)
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
    }
}

fn parse_response(text: &str) -> Result<Option<Media>, SourceError> {
    let parsed: GraphQlResponse = serde_json::from_str(text).map_err(|e| SourceError::Decode {
        provider: PROVIDER,
        message: e.to_string(),
    })?;

    if let Some(error) = parsed.errors.first() {
        return Err(SourceError::Decode {
            provider: PROVIDER,
            message: error.message.clone(),
        });
    }

    Ok(parsed.data.and_then(|d| d.media))
}

/// Aired episode count for a matched media entry.
///
/// While a show is airing, `nextAiringEpisode.episode - 1` is what has
/// actually been broadcast; `episodes` is the planned total.
pub(crate) fn episodes_from_media(query: &str, media: &Media) -> Option<u32> {
    let titles = [media.title.romaji.as_deref(), media.title.english.as_deref()];
    if !any_similar(query, titles) {
        return None;
    }

    let count = match &media.next_airing_episode {
        Some(next) => next.episode - 1,
        None => media.episodes?,
    };

    u32::try_from(count).ok().filter(|c| *c > 0)
}

#[async_trait]
impl EpisodeSource for AniListSource {
    fn source_name(&self) -> &str {
        PROVIDER
    }

    async fn try_resolve(&self, title: &str) -> Result<Option<EpisodeFinding>, SourceError> {
        let Some(media) = self.search(title).await? else {
            debug!(provider = PROVIDER, title, "No AniList result");
            return Ok(None);
        };

        let finding = episodes_from_media(title, &media).map(|count| EpisodeFinding::new(count, PROVIDER));
        if finding.is_none() {
            debug!(
                provider = PROVIDER,
                title,
                romaji = media.title.romaji.as_deref().unwrap_or(""),
                "AniList result rejected"
            );
        }
        Ok(finding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(json: &str) -> Media {
        parse_response(json).unwrap().unwrap()
    }

    #[test]
    fn test_airing_show_uses_next_episode_minus_one() {
        let m = media(r#"{"data":{"Media":{"id":1,"title":{"romaji":"Sousou no Frieren","english":"Frieren: Beyond Journey's End"},"episodes":28,"status":"RELEASING","nextAiringEpisode":{"episode":11}}}}"#);
        assert_eq!(episodes_from_media("Frieren: Beyond Journey's End", &m), Some(10));
    }

    #[test]
    fn test_finished_show_uses_total() {
        let m = media(r#"{"data":{"Media":{"id":2,"title":{"romaji":"Mushishi","english":null},"episodes":26,"status":"FINISHED","nextAiringEpisode":null}}}"#);
        assert_eq!(episodes_from_media("Mushishi", &m), Some(26));
    }

    #[test]
    fn test_unaired_show_is_discarded() {
        let m = media(r#"{"data":{"Media":{"id":3,"title":{"romaji":"Kaiju No. 8","english":"Kaiju No. 8"},"episodes":12,"nextAiringEpisode":{"episode":1}}}}"#);
        assert_eq!(episodes_from_media("Kaiju No. 8", &m), None);
    }

    #[test]
    fn test_title_mismatch_is_discarded() {
        let m = media(r#"{"data":{"Media":{"id":4,"title":{"romaji":"Monster","english":"Monster"},"episodes":74}}}"#);
        assert_eq!(episodes_from_media("Mushishi", &m), None);
    }

    #[test]
    fn test_graphql_errors_are_reported() {
        let err = parse_response(r#"{"data":{"Media":null},"errors":[{"message":"Not Found.","status":404}]}"#).unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }));
    }

    #[test]
    fn test_null_media_is_none() {
        assert!(parse_response(r#"{"data":{"Media":null}}"#).unwrap().is_none());
    }
}
