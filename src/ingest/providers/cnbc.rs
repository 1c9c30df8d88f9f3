// src/ingest/providers/cnbc.rs
//! CNBC search results (Queryly), newest first, 100 per page.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use reqwest::Url;
use serde::Deserialize;

use crate::article::{Article, Origin};
use crate::ingest::http::HttpGet;
use crate::ingest::paging::{self, Dated, Page};
use crate::ingest::rate_limit::{RateLimit, RateLimitedCall};
use crate::ingest::timestamp;
use crate::ingest::types::{Fetched, SourceAdapter, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://api.queryly.com/cnbc/json.aspx";
pub const DEFAULT_QUERY: &str = "Politics";
pub const RATE_LIMIT: RateLimit = RateLimit::per_minute(120);

const QUERYLY_KEY: &str = "31a35d40a9a64ab3";
const PAGE_SIZE: u32 = 100;
const BRAND: &str = "cnbc";
const EXCLUDED_TYPES: &[&str] = &["cnbcvideo", "live_story"];

#[derive(Debug, thiserror::Error)]
pub enum CnbcError {
    #[error("unexpected CNBC payload on page {page}: {source}")]
    Payload {
        page: u32,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    metadata: Metadata,
    #[serde(default)]
    results: Vec<CnbcItem>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    totalpage: u32,
}

/// `cn:contentClassification` arrives either as a single tag or a list of tags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Classification {
    Tag(String),
    Tags(Vec<String>),
}

impl Classification {
    fn tags(&self) -> Vec<&str> {
        match self {
            Classification::Tag(s) => s.split(',').map(str::trim).collect(),
            Classification::Tags(v) => v.iter().map(|s| s.trim()).collect(),
        }
    }

    pub fn is_premium(&self) -> bool {
        self.tags().iter().any(|t| t.eq_ignore_ascii_case("premium"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CnbcItem {
    pub url: String,
    #[serde(rename = "datePublished", deserialize_with = "timestamp::deserialize")]
    pub date_published: DateTime<Utc>,
    #[serde(rename = "cn:contentClassification", default)]
    pub classification: Option<Classification>,
    #[serde(rename = "cn:branding", default)]
    pub branding: Option<String>,
    #[serde(rename = "cn:type", default)]
    pub kind: Option<String>,
}

impl CnbcItem {
    /// Premium content, foreign branding, videos and live stories are skipped.
    pub fn is_valid(&self) -> bool {
        if self.classification.as_ref().is_some_and(Classification::is_premium) {
            return false;
        }
        if self.branding.as_deref() != Some(BRAND) {
            return false;
        }
        !self
            .kind
            .as_deref()
            .is_some_and(|kind| EXCLUDED_TYPES.contains(&kind))
    }
}

impl Dated for CnbcItem {
    fn published_at(&self) -> DateTime<Utc> {
        self.date_published
    }
}

pub struct CnbcAdapter {
    base: Url,
    query: String,
    api: RateLimitedCall<HttpGet>,
}

impl CnbcAdapter {
    pub fn new(base_url: &str, query: impl Into<String>) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("parsing CNBC url {base_url}"))?;
        Ok(Self {
            base,
            query: query.into(),
            api: RateLimitedCall::new("cnbc_search", RATE_LIMIT, HttpGet::new("CNBC")),
        })
    }

    pub fn with_rate_limit(self, limit: RateLimit) -> Self {
        let http = self.api.operation().clone();
        Self {
            api: RateLimitedCall::new("cnbc_search", limit, http),
            ..self
        }
    }

    /// Deadline for a single request; a stalled request is retried.
    pub fn with_request_timeout(self, timeout: std::time::Duration) -> Self {
        let http = self.api.operation().clone().with_timeout(timeout);
        Self {
            api: RateLimitedCall::new("cnbc_search", self.api.limit(), http),
            ..self
        }
    }

    fn page_url(&self, page: u32) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("queryly_key", QUERYLY_KEY)
            .append_pair("query", &self.query)
            .append_pair("endindex", &(page * PAGE_SIZE).to_string())
            .append_pair("batchsize", &PAGE_SIZE.to_string())
            .append_pair("sort", "date");
        url
    }

    async fn fetch_page(&self, page: u32) -> Result<Page<CnbcItem>, CnbcError> {
        let body = self.api.call(self.page_url(page)).await;
        counter!("ingest_pages_fetched_total", "provider" => "CNBC").increment(1);

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|source| CnbcError::Payload { page, source })?;
        Ok(Page {
            total_pages: parsed.metadata.totalpage,
            items: parsed.results,
        })
    }
}

#[async_trait]
impl SourceAdapter for CnbcAdapter {
    async fn fetch_newest(&self, watermark: DateTime<Utc>) -> Result<Fetched, SourceError> {
        let walk = paging::walk_to_boundary(0, watermark, |page| self.fetch_page(page)).await?;
        tracing::debug!(
            target: "ingest",
            provider = "CNBC",
            pages = walk.pages_fetched,
            boundary = walk.boundary_found,
            "walked result pages"
        );

        Ok(
            paging::first_after(walk.items, watermark, CnbcItem::is_valid).map(|item| {
                let t = item.date_published;
                (t, Article::new(item.url, t, Origin::Cnbc))
            }),
        )
    }

    fn origin(&self) -> Origin {
        Origin::Cnbc
    }

    fn poll_interval(&self) -> Option<std::time::Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(classification: &str, branding: &str, kind: &str) -> CnbcItem {
        serde_json::from_value(json!({
            "url": "https://www.cnbc.com/2024/05/01/story.html",
            "datePublished": "2024-05-01T12:00:00+0000",
            "cn:contentClassification": classification,
            "cn:branding": branding,
            "cn:type": kind,
        }))
        .unwrap()
    }

    #[test]
    fn ordering_follows_date_published() {
        let item: CnbcItem = serde_json::from_value(json!({
            "url": "https://www.cnbc.com/2024/05/01/story.html",
            "datePublished": "2024-05-01T12:00:00+0000",
            "pubdateunix": 1714564800,
            "cn:branding": "cnbc",
        }))
        .unwrap();
        assert_eq!(item.published_at().to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn premium_article_is_invalid() {
        assert!(!item("premium", "cnbc", "article").is_valid());
    }

    #[test]
    fn foreign_branding_is_invalid() {
        assert!(!item("non-premium", "bbc", "article").is_valid());
    }

    #[test]
    fn video_and_live_story_are_invalid() {
        assert!(!item("non-premium", "cnbc", "cnbcvideo").is_valid());
        assert!(!item("non-premium", "cnbc", "live_story").is_valid());
    }

    #[test]
    fn plain_cnbc_article_is_valid() {
        assert!(item("non-premium", "cnbc", "article").is_valid());
    }

    #[test]
    fn classification_list_with_premium_tag_is_invalid() {
        let it: CnbcItem = serde_json::from_value(json!({
            "url": "https://www.cnbc.com/pro/x.html",
            "datePublished": "2024-05-01T12:00:00+0000",
            "cn:contentClassification": ["pro", "premium"],
            "cn:branding": "cnbc",
            "cn:type": "article",
        }))
        .unwrap();
        assert!(!it.is_valid());
    }

    #[test]
    fn missing_branding_is_invalid() {
        let it: CnbcItem = serde_json::from_value(json!({
            "url": "https://www.cnbc.com/x.html",
            "datePublished": "2024-05-01T12:00:00+0000",
            "cn:type": "article",
        }))
        .unwrap();
        assert!(!it.is_valid());
    }

    #[test]
    fn page_url_carries_offset_and_batch_size() {
        let adapter = CnbcAdapter::new(DEFAULT_BASE_URL, "Politics").unwrap();
        let url = adapter.page_url(3);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("endindex".into(), "300".into())));
        assert!(pairs.contains(&("batchsize".into(), "100".into())));
        assert!(pairs.contains(&("query".into(), "Politics".into())));
        assert!(pairs.contains(&("sort".into(), "date".into())));
    }
}
