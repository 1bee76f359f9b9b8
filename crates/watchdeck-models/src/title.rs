use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_RATING: u8 = 5;

/// One entry of the user's library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackedTitle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub episode_count: u32,
    #[serde(default)]
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,
    #[serde(default)]
    pub order_index: i64,
    #[serde(default = "Utc::now")]
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub tags: Vec<String>, // Ordered, no duplicates (see add_tag)
    #[serde(default = "default_category")]
    pub category_type: String,
}

fn default_category() -> String {
    "ANIME".to_string()
}

impl TrackedTitle {
    pub fn new(id: impl Into<String>, title: impl Into<String>, category_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            episode_count: 0,
            rating: 0,
            image_reference: None,
            order_index: 0,
            date_added: Utc::now(),
            is_favorite: false,
            tags: Vec::new(),
            category_type: category_type.into(),
        }
    }

    /// Set the rating, clamped to 0..=5
    pub fn set_rating(&mut self, rating: u8) {
        self.rating = rating.min(MAX_RATING);
    }

    /// Add a tag, keeping insertion order and ignoring duplicates.
    /// Returns false when the tag was already present or blank.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        before != self.tags.len()
    }

    pub fn content_type(&self) -> crate::ContentType {
        crate::ContentType::from_category(&self.category_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_tag_keeps_order_and_dedupes() {
        let mut title = TrackedTitle::new("1", "Frieren", "ANIME");
        assert!(title.add_tag("fantasy"));
        assert!(title.add_tag("adventure"));
        assert!(!title.add_tag("fantasy"));
        assert!(!title.add_tag("   "));
        assert_eq!(title.tags, vec!["fantasy", "adventure"]);
        assert!(title.remove_tag("fantasy"));
        assert_eq!(title.tags, vec!["adventure"]);
    }

    #[test]
    fn test_rating_is_clamped() {
        let mut title = TrackedTitle::new("1", "Frieren", "ANIME");
        title.set_rating(9);
        assert_eq!(title.rating, 5);
    }

    #[test]
    fn test_deserialize_with_missing_fields() {
        let json = r#"{"id":"abc","title":"Mushishi"}"#;
        let title: TrackedTitle = serde_json::from_str(json).unwrap();
        assert_eq!(title.episode_count, 0);
        assert_eq!(title.category_type, "ANIME");
        assert!(title.tags.is_empty());
    }
}
