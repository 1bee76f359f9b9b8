use serde::Deserialize;

pub const API_URL: &str = "https://graphql.anilist.co";

pub const SEARCH_QUERY: &str = r#"
query ($search: String) {
  Media(search: $search, type: ANIME) {
    id
    title { romaji english }
    episodes
    status
    nextAiringEpisode { episode }
  }
}
"#;

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse {
    pub data: Option<MediaData>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaData {
    #[serde(rename = "Media")]
    pub media: Option<Media>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: Option<i64>,
    pub title: MediaTitle,
    pub episodes: Option<i64>,
    pub status: Option<String>,
    pub next_airing_episode: Option<AiringEpisode>,
}

#[derive(Debug, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AiringEpisode {
    pub episode: i64,
}
