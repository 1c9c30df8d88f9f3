//! # Paging harness
//! Shared "find the first article after the watermark" walk for providers that
//! paginate in descending publish order.
//!
//! Pages are requested one by one until the **boundary page**: the first page
//! whose oldest item is not newer than the watermark. Every walked page is kept,
//! merged, and turned into ascending order so an article sitting at the tail of
//! the page before the boundary is still found.

use std::future::Future;

use chrono::{DateTime, Utc};

/// Anything carrying a publish time.
pub trait Dated {
    fn published_at(&self) -> DateTime<Utc>;
}

/// One provider page, items newest first.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub total_pages: u32,
    pub items: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct PageWalk<T> {
    /// Items of every walked page, oldest first.
    pub items: Vec<T>,
    pub boundary_found: bool,
    pub pages_fetched: u32,
}

/// Walk pages `first_page..first_page + total_pages` until the boundary page.
///
/// The first response also supplies the total page count, so no separate
/// counting request is made.
pub async fn walk_to_boundary<T, E, F, Fut>(
    first_page: u32,
    watermark: DateTime<Utc>,
    mut fetch: F,
) -> Result<PageWalk<T>, E>
where
    T: Dated,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut current = fetch(first_page).await?;
    let last_page = first_page + current.total_pages.saturating_sub(1);
    let mut page = first_page;
    let mut pages_fetched = 1;
    let mut walked: Vec<Vec<T>> = Vec::new();
    let mut boundary_found = false;

    loop {
        let is_boundary = current
            .items
            .last()
            .is_some_and(|oldest| oldest.published_at() <= watermark);
        walked.push(current.items);

        if is_boundary {
            boundary_found = true;
            break;
        }
        if page >= last_page {
            break;
        }

        page += 1;
        current = fetch(page).await?;
        pages_fetched += 1;
    }

    let mut items: Vec<T> = walked.into_iter().flatten().collect();
    items.reverse();

    Ok(PageWalk {
        items,
        boundary_found,
        pages_fetched,
    })
}

/// First item (in the given ascending order) strictly after `watermark` that
/// passes `is_valid`.
pub fn first_after<T, I, P>(items: I, watermark: DateTime<Utc>, is_valid: P) -> Option<T>
where
    T: Dated,
    I: IntoIterator<Item = T>,
    P: Fn(&T) -> bool,
{
    items
        .into_iter()
        .find(|item| item.published_at() > watermark && is_valid(item))
}
