use tracing::{debug, info, warn};
use watchdeck_models::{ContentType, EpisodeFinding};
use watchdeck_sources::ProviderChains;

/// Walks the provider chain for a content type until one provider returns a finding.
pub struct EpisodeResolver {
    chains: ProviderChains,
}

impl EpisodeResolver {
    pub fn new(chains: ProviderChains) -> Self {
        Self { chains }
    }

    pub fn has_providers(&self, content_type: ContentType) -> bool {
        !self.chains.for_content(content_type).is_empty()
    }

    /// First positive finding in priority order, or `None`.
    ///
    /// A failing provider is logged and treated as "no result"; it never stops
    /// the next provider from being tried.
    pub async fn find_total_episodes(
        &self,
        title: &str,
        category_type: &str,
        content_type: ContentType,
    ) -> Option<EpisodeFinding> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }

        for source in self.chains.for_content(content_type) {
            match source.try_resolve(title).await {
                Ok(Some(finding)) if finding.episode_count > 0 => {
                    info!(
                        operation = "resolve",
                        provider = source.source_name(),
                        title,
                        category = category_type,
                        episode_count = finding.episode_count,
                        "Found episode count"
                    );
                    return Some(finding);
                }
                Ok(_) => {
                    debug!(
                        operation = "resolve",
                        provider = source.source_name(),
                        title,
                        "No match"
                    );
                }
                Err(e) => {
                    warn!(
                        operation = "resolve",
                        provider = source.source_name(),
                        title,
                        error = %e,
                        "Provider lookup failed, trying next"
                    );
                }
            }
        }

        debug!(operation = "resolve", title, %content_type, "No provider had a result");
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use watchdeck_sources::{EpisodeSource, SourceError};

    /// Scripted provider: returns a fixed answer and counts calls
    pub(crate) struct FakeSource {
        name: &'static str,
        answer: Option<u32>,
        fail: bool,
        pub calls: AtomicUsize,
    }

    impl FakeSource {
        pub(crate) fn hit(name: &'static str, episodes: u32) -> Arc<Self> {
            Arc::new(Self { name, answer: Some(episodes), fail: false, calls: AtomicUsize::new(0) })
        }

        pub(crate) fn miss(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, answer: None, fail: false, calls: AtomicUsize::new(0) })
        }

        pub(crate) fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, answer: None, fail: true, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl EpisodeSource for FakeSource {
        fn source_name(&self) -> &str {
            self.name
        }

        async fn try_resolve(&self, _title: &str) -> Result<Option<EpisodeFinding>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::Status {
                    provider: self.name,
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(self.answer.map(|n| EpisodeFinding::new(n, self.name)))
        }
    }

    fn anime_chain(sources: Vec<Arc<FakeSource>>) -> EpisodeResolver {
        let anime = sources.into_iter().map(|s| s as Arc<dyn EpisodeSource>).collect();
        EpisodeResolver::new(ProviderChains { anime, movie_or_series: Vec::new() })
    }

    #[tokio::test]
    async fn test_first_hit_wins() {
        let anilist = FakeSource::hit("AniList", 12);
        let shikimori = FakeSource::hit("Shikimori", 13);
        let resolver = anime_chain(vec![anilist.clone(), shikimori.clone()]);

        let finding = resolver
            .find_total_episodes("Frieren", "ANIME", ContentType::Anime)
            .await
            .unwrap();
        assert_eq!(finding, EpisodeFinding::new(12, "AniList"));
        assert_eq!(shikimori.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_through_misses_and_errors() {
        let anilist = FakeSource::failing("AniList");
        let shikimori = FakeSource::miss("Shikimori");
        let jikan = FakeSource::hit("Jikan", 28);
        let resolver = anime_chain(vec![anilist.clone(), shikimori.clone(), jikan.clone()]);

        let finding = resolver
            .find_total_episodes("Frieren", "ANIME", ContentType::Anime)
            .await
            .unwrap();
        assert_eq!(finding.source_name, "Jikan");
        assert_eq!(anilist.calls.load(Ordering::SeqCst), 1);
        assert_eq!(shikimori.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_count_is_not_a_hit() {
        let resolver = anime_chain(vec![FakeSource::hit("AniList", 0), FakeSource::hit("Jikan", 5)]);
        let finding = resolver
            .find_total_episodes("Frieren", "ANIME", ContentType::Anime)
            .await
            .unwrap();
        assert_eq!(finding.source_name, "Jikan");
    }

    #[tokio::test]
    async fn test_content_type_selects_chain() {
        let resolver = anime_chain(vec![FakeSource::hit("AniList", 12)]);
        assert!(resolver
            .find_total_episodes("Severance", "SERIES", ContentType::MovieOrSeries)
            .await
            .is_none());
        assert!(!resolver.has_providers(ContentType::MovieOrSeries));
    }

    #[tokio::test]
    async fn test_all_failing_returns_none() {
        let resolver = anime_chain(vec![FakeSource::failing("AniList"), FakeSource::failing("Jikan")]);
        assert!(resolver
            .find_total_episodes("Frieren", "ANIME", ContentType::Anime)
            .await
            .is_none());
    }
}
