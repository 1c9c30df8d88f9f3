//! Article storage collaborator.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};

use crate::article::Article;

#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Insert `article`, keyed by URL, and return its id. Adding a URL that is
    /// already stored returns the existing id.
    async fn add_article(&self, article: &Article) -> Result<i64>;
}

/// In-process storage with upsert-by-URL semantics.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    ids: HashMap<String, i64>,
    rows: Vec<Article>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic while holding the lock leaves the maps consistent (every
    /// mutation is a single push/insert), so a poisoned lock is recovered.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: i64) -> Option<Article> {
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        self.lock().rows.get(idx).cloned()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn add_article(&self, article: &Article) -> Result<i64> {
        let url = article
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("article without url cannot be stored"))?;

        let mut inner = self.lock();
        if let Some(&id) = inner.ids.get(url) {
            return Ok(id);
        }
        inner.rows.push(article.clone());
        let id = inner.rows.len() as i64;
        inner.ids.insert(url.to_string(), id);

        tracing::info!(
            target: "storage",
            id,
            url,
            origin = ?article.origin,
            "stored article"
        );
        Ok(id)
    }
}
