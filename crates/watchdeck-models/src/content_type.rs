use serde::{Deserialize, Serialize};

/// Which provider chain a title is resolved against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ContentType {
    Anime,
    MovieOrSeries,
}

impl ContentType {
    /// Map a stored category string onto a content type.
    /// Unknown categories are treated as anime.
    pub fn from_category(category_type: &str) -> Self {
        match category_type.trim().to_uppercase().as_str() {
            "MOVIE" | "MOVIES" | "SERIES" | "TV" | "SHOW" => ContentType::MovieOrSeries,
            _ => ContentType::Anime,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Anime => write!(f, "anime"),
            ContentType::MovieOrSeries => write!(f, "movie/series"),
        }
    }
}
