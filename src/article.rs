//! # Article
//! Value record handed from source adapters to the sink chain.
//!
//! An article with every field unset is the "nothing new" sentinel and is
//! never delivered downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider an article was discovered on. Serialised as its one-letter tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "c")]
    Cnbc,
    #[serde(rename = "g")]
    Guardian,
    #[serde(rename = "n")]
    Nyt,
}

impl Origin {
    /// Short source tag stored alongside the article ("c", "g", "n").
    pub fn tag(self) -> &'static str {
        match self {
            Origin::Cnbc => "c",
            Origin::Guardian => "g",
            Origin::Nyt => "n",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Origin::Cnbc => "CNBC",
            Origin::Guardian => "Guardian",
            Origin::Nyt => "NYT",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub origin: Option<Origin>,
}

impl Article {
    /// A fully populated article, as produced by the adapters.
    pub fn new(url: impl Into<String>, published_at: DateTime<Utc>, origin: Origin) -> Self {
        Self {
            url: Some(url.into()),
            published_at: Some(published_at),
            origin: Some(origin),
        }
    }

    /// The "no new article this cycle" sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.published_at.is_none() && self.origin.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_only_when_every_field_is_unset() {
        assert!(Article::empty().is_empty());

        let t = Utc.with_ymd_and_hms(2021, 3, 2, 14, 0, 0).unwrap();
        assert!(!Article::new("https://example.com/a", t, Origin::Cnbc).is_empty());

        let only_url = Article {
            url: Some("https://example.com/a".into()),
            ..Article::default()
        };
        assert!(!only_url.is_empty());

        let only_time = Article {
            published_at: Some(t),
            ..Article::default()
        };
        assert!(!only_time.is_empty());

        let only_origin = Article {
            origin: Some(Origin::Nyt),
            ..Article::default()
        };
        assert!(!only_origin.is_empty());
    }

    #[test]
    fn origin_serialises_as_single_letter_tag() {
        let json = serde_json::to_string(&Origin::Guardian).unwrap();
        assert_eq!(json, "\"g\"");
        assert_eq!(Origin::Cnbc.tag(), "c");
        assert_eq!(Origin::Nyt.to_string(), "n");
    }
}
