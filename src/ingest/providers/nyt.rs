// src/ingest/providers/nyt.rs
//! New York Times: the "recent" newswire for fresh watermarks, the monthly
//! archive once the watermark is more than a day old.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use metrics::counter;
use reqwest::Url;
use serde::Deserialize;

use crate::article::{Article, Origin};
use crate::ingest::http::HttpGet;
use crate::ingest::rate_limit::{RateLimit, RateLimitedCall};
use crate::ingest::timestamp::parse_timestamp;
use crate::ingest::types::{Fetched, SourceAdapter, SourceError};

pub const DEFAULT_RECENT_URL: &str = "https://api.nytimes.com/svc/news/v3/content/all/world.json";
pub const DEFAULT_ARCHIVE_URL: &str = "https://api.nytimes.com/svc/archive/v1";
pub const RATE_LIMIT: RateLimit = RateLimit::per_minute(5);
pub const DEFAULT_SUBSECTIONS: &[&str] = &[
    "Politics",
    "Europe",
    "Asia Pacific",
    "Middle East",
    "Africa",
    "Australia",
    "Americas",
    "Canada",
];

const RECENT_LIMIT: u32 = 500;
const RECENT_HORIZON_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum NytError {
    #[error("unexpected NYT {endpoint} payload: {source}")]
    Payload {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("NYT {endpoint} item has an unusable {field}: {value:?}")]
    MalformedItem {
        endpoint: &'static str,
        field: &'static str,
        value: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RecentResponse {
    #[serde(default)]
    results: Vec<RecentDoc>,
}

#[derive(Debug, Deserialize)]
struct RecentDoc {
    #[serde(default)]
    subsection: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    response: ArchiveDocs,
}

#[derive(Debug, Deserialize)]
struct ArchiveDocs {
    #[serde(default)]
    docs: Vec<ArchiveDoc>,
}

#[derive(Debug, Deserialize)]
struct ArchiveDoc {
    #[serde(default)]
    subsection_name: Option<String>,
    #[serde(default)]
    pub_date: Option<String>,
    #[serde(default)]
    web_url: Option<String>,
}

/// An allow-listed NYT item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NytItem {
    pub url: String,
    pub published_at: DateTime<Utc>,
}

/// Recent feed, newest first: the allowed item just before (newer than) the
/// first allowed item that is not newer than the watermark.
pub fn select_recent(items: &[NytItem], watermark: DateTime<Utc>) -> Option<&NytItem> {
    let boundary = items.iter().position(|it| it.published_at <= watermark)?;
    boundary.checked_sub(1).map(|i| &items[i])
}

/// Archive month, oldest first: the allowed item right after the last one that
/// is not newer than the watermark.
pub fn select_archive(items: &[NytItem], watermark: DateTime<Utc>) -> Option<&NytItem> {
    let next = items
        .iter()
        .rposition(|it| it.published_at <= watermark)
        .map_or(0, |i| i + 1);
    items.get(next)
}

/// Keep only items in an allowed subsection, parsed. Items without a
/// subsection never reach the boundary scan.
fn allowed_items<I>(
    docs: I,
    subsections: &[String],
    endpoint: &'static str,
) -> Result<Vec<NytItem>, NytError>
where
    I: IntoIterator<Item = (Option<String>, Option<String>, Option<String>)>,
{
    let mut out = Vec::new();
    for (subsection, published, url) in docs {
        let allowed = subsection
            .as_deref()
            .filter(|s| !s.is_empty())
            .is_some_and(|s| subsections.iter().any(|a| a == s));
        if !allowed {
            continue;
        }

        let published_at = published
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or_else(|| NytError::MalformedItem {
                endpoint,
                field: "publish date",
                value: published.clone(),
            })?;
        let url = url
            .filter(|u| !u.is_empty())
            .ok_or(NytError::MalformedItem {
                endpoint,
                field: "url",
                value: None,
            })?;
        out.push(NytItem { url, published_at });
    }
    Ok(out)
}

/// `(year, month)` pairs from `from`'s month through `to`'s month.
fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<(i32, u32)> {
    let (mut year, mut month) = (from.year(), from.month());
    let end = (to.year(), to.month());
    let mut out = Vec::new();
    while (year, month) <= end {
        out.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    out
}

pub struct NytAdapter {
    recent: Url,
    archive: Url,
    api_key: String,
    subsections: Vec<String>,
    api: RateLimitedCall<HttpGet>,
}

impl NytAdapter {
    pub fn new(
        recent_url: &str,
        archive_url: &str,
        api_key: impl Into<String>,
        subsections: Vec<String>,
    ) -> Result<Self> {
        let recent =
            Url::parse(recent_url).with_context(|| format!("parsing NYT url {recent_url}"))?;
        let archive =
            Url::parse(archive_url).with_context(|| format!("parsing NYT url {archive_url}"))?;
        if archive.cannot_be_a_base() {
            bail!("NYT archive url {archive_url} cannot take a path");
        }
        Ok(Self {
            recent,
            archive,
            api_key: api_key.into(),
            subsections,
            api: RateLimitedCall::new("nyt_api", RATE_LIMIT, HttpGet::new("NYT")),
        })
    }

    pub fn with_rate_limit(self, limit: RateLimit) -> Self {
        let http = self.api.operation().clone();
        Self {
            api: RateLimitedCall::new("nyt_api", limit, http),
            ..self
        }
    }

    /// Deadline for a single request; a stalled request is retried.
    pub fn with_request_timeout(self, timeout: std::time::Duration) -> Self {
        let http = self.api.operation().clone().with_timeout(timeout);
        Self {
            api: RateLimitedCall::new("nyt_api", self.api.limit(), http),
            ..self
        }
    }

    pub fn subsections(&self) -> &[String] {
        &self.subsections
    }

    fn recent_url(&self) -> Url {
        let mut url = self.recent.clone();
        url.query_pairs_mut()
            .append_pair("api-key", &self.api_key)
            .append_pair("limit", &RECENT_LIMIT.to_string());
        url
    }

    fn archive_url(&self, year: i32, month: u32) -> Url {
        let mut url = self.archive.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&year.to_string())
                .push(&format!("{month}.json"));
        }
        url.query_pairs_mut().append_pair("api-key", &self.api_key);
        url
    }

    async fn fetch_recent(&self) -> Result<Vec<NytItem>, NytError> {
        let body = self.api.call(self.recent_url()).await;
        counter!("ingest_pages_fetched_total", "provider" => "NYT").increment(1);

        let parsed: RecentResponse = serde_json::from_str(&body).map_err(|source| {
            NytError::Payload {
                endpoint: "recent",
                source,
            }
        })?;
        let docs = parsed
            .results
            .into_iter()
            .map(|d| (d.subsection, d.published_date, d.url));
        let mut items = allowed_items(docs, &self.subsections, "recent")?;
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(items)
    }

    async fn fetch_archive(&self, year: i32, month: u32) -> Result<Vec<NytItem>, NytError> {
        let body = self.api.call(self.archive_url(year, month)).await;
        counter!("ingest_pages_fetched_total", "provider" => "NYT").increment(1);

        let parsed: ArchiveResponse = serde_json::from_str(&body).map_err(|source| {
            NytError::Payload {
                endpoint: "archive",
                source,
            }
        })?;
        let docs = parsed
            .response
            .docs
            .into_iter()
            .map(|d| (d.subsection_name, d.pub_date, d.web_url));
        let mut items = allowed_items(docs, &self.subsections, "archive")?;
        items.sort_by_key(|it| it.published_at);
        Ok(items)
    }

    fn found(item: &NytItem) -> (DateTime<Utc>, Article) {
        (
            item.published_at,
            Article::new(item.url.clone(), item.published_at, Origin::Nyt),
        )
    }
}

#[async_trait]
impl SourceAdapter for NytAdapter {
    async fn fetch_newest(&self, watermark: DateTime<Utc>) -> Result<Fetched, SourceError> {
        let now = Utc::now();

        if now.signed_duration_since(watermark) <= Duration::hours(RECENT_HORIZON_HOURS) {
            let items = self.fetch_recent().await?;
            return Ok(select_recent(&items, watermark).map(Self::found));
        }

        for (year, month) in months_between(watermark, now) {
            let items = self.fetch_archive(year, month).await?;
            tracing::debug!(
                target: "ingest",
                provider = "NYT",
                year,
                month,
                allowed = items.len(),
                "scanned archive month"
            );
            if let Some(item) = select_archive(&items, watermark) {
                return Ok(Some(Self::found(item)));
            }
        }
        Ok(None)
    }

    fn origin(&self) -> Origin {
        Origin::Nyt
    }
}
