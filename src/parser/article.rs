use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An entry found on a listing page, feed or API response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub title: String,
    pub link: String,
    /// Body shipped inline with the listing (feed content, API field)
    pub content: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            content: None,
        }
    }

    pub fn with_content(mut self, content: Option<String>) -> Self {
        self.content = content.filter(|c| !c.trim().is_empty());
        self
    }
}

/// A summarized article as written to the digest report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedArticle {
    pub id: String,
    pub site: String,
    pub title: String,
    pub link: String,
    pub summary_en: String,
    pub summary_zh: String,
    pub key_points_en: Vec<String>,
    pub key_points_zh: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProcessedArticle {
    /// Stable id derived from the article link.
    pub fn link_id(link: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(link.trim().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }
}
