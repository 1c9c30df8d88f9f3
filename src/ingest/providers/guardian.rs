// src/ingest/providers/guardian.rs
//! Guardian content API, world section, date-bounded and newest first.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use reqwest::Url;
use serde::Deserialize;

use crate::article::{Article, Origin};
use crate::ingest::http::HttpGet;
use crate::ingest::paging::{self, Dated, Page};
use crate::ingest::rate_limit::{RateLimit, RateLimitedCall};
use crate::ingest::timestamp;
use crate::ingest::types::{Fetched, SourceAdapter, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://content.guardianapis.com/world";
pub const RATE_LIMIT: RateLimit = RateLimit::per_minute(10);

const PAGE_SIZE: u32 = 200;

#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    #[error("unexpected Guardian payload on page {page}: {source}")]
    Payload {
        page: u32,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    pages: u32,
    #[serde(default)]
    results: Vec<GuardianItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuardianItem {
    #[serde(rename = "webUrl")]
    pub web_url: String,
    #[serde(rename = "webPublicationDate", deserialize_with = "timestamp::deserialize")]
    pub web_publication_date: DateTime<Utc>,
}

impl Dated for GuardianItem {
    fn published_at(&self) -> DateTime<Utc> {
        self.web_publication_date
    }
}

pub struct GuardianAdapter {
    base: Url,
    api_key: String,
    api: RateLimitedCall<HttpGet>,
}

impl GuardianAdapter {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let base =
            Url::parse(base_url).with_context(|| format!("parsing Guardian url {base_url}"))?;
        Ok(Self {
            base,
            api_key: api_key.into(),
            api: RateLimitedCall::new("guardian_content", RATE_LIMIT, HttpGet::new("Guardian")),
        })
    }

    pub fn with_rate_limit(self, limit: RateLimit) -> Self {
        let http = self.api.operation().clone();
        Self {
            api: RateLimitedCall::new("guardian_content", limit, http),
            ..self
        }
    }

    /// Deadline for a single request; a stalled request is retried.
    pub fn with_request_timeout(self, timeout: std::time::Duration) -> Self {
        let http = self.api.operation().clone().with_timeout(timeout);
        Self {
            api: RateLimitedCall::new("guardian_content", self.api.limit(), http),
            ..self
        }
    }

    fn page_url(&self, from: NaiveDate, to: NaiveDate, page: u32) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("api-key", &self.api_key)
            .append_pair("page-size", &PAGE_SIZE.to_string())
            .append_pair("from-date", &from.format("%Y-%m-%d").to_string())
            .append_pair("to-date", &to.format("%Y-%m-%d").to_string())
            .append_pair("page", &page.to_string());
        url
    }

    async fn fetch_page(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        page: u32,
    ) -> Result<Page<GuardianItem>, GuardianError> {
        let body = self.api.call(self.page_url(from, to, page)).await;
        counter!("ingest_pages_fetched_total", "provider" => "Guardian").increment(1);

        let parsed: Envelope = serde_json::from_str(&body)
            .map_err(|source| GuardianError::Payload { page, source })?;
        Ok(Page {
            total_pages: parsed.response.pages,
            items: parsed.response.results,
        })
    }
}

#[async_trait]
impl SourceAdapter for GuardianAdapter {
    async fn fetch_newest(&self, watermark: DateTime<Utc>) -> Result<Fetched, SourceError> {
        let from = watermark.date_naive();
        let to = Utc::now().date_naive();

        let walk =
            paging::walk_to_boundary(1, watermark, |page| self.fetch_page(from, to, page)).await?;
        tracing::debug!(
            target: "ingest",
            provider = "Guardian",
            pages = walk.pages_fetched,
            boundary = walk.boundary_found,
            "walked result pages"
        );
        if !walk.boundary_found {
            return Ok(None);
        }

        Ok(paging::first_after(walk.items, watermark, |_| true).map(|item| {
            let t = item.web_publication_date;
            (t, Article::new(item.web_url, t, Origin::Guardian))
        }))
    }

    fn origin(&self) -> Origin {
        Origin::Guardian
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_is_date_bounded() {
        let adapter = GuardianAdapter::new(DEFAULT_BASE_URL, "k").unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let url = adapter.page_url(from, to, 2);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/world");
        assert!(pairs.contains(&("from-date".into(), "2024-05-01".into())));
        assert!(pairs.contains(&("to-date".into(), "2024-05-03".into())));
        assert!(pairs.contains(&("page-size".into(), "200".into())));
        assert!(pairs.contains(&("page".into(), "2".into())));
        assert!(pairs.contains(&("api-key".into(), "k".into())));
    }

    #[test]
    fn parses_publication_dates() {
        let item: GuardianItem = serde_json::from_str(
            r#"{"webUrl":"https://www.theguardian.com/world/x","webPublicationDate":"2024-05-01T08:30:00Z","sectionId":"world"}"#,
        )
        .unwrap();
        assert_eq!(item.published_at().to_rfc3339(), "2024-05-01T08:30:00+00:00");
    }
}
