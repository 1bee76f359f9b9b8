use serde::Deserialize;

pub const API_BASE: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Deserialize)]
pub struct TvSearchResponse {
    #[serde(default)]
    pub results: Vec<TvSearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct TvSearchResult {
    pub id: u64,
    pub name: Option<String>,
    pub original_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TvDetails {
    #[serde(default)]
    pub seasons: Vec<Season>,
}

#[derive(Debug, Deserialize)]
pub struct Season {
    pub season_number: i64,
    #[serde(default)]
    pub episode_count: i64,
}
