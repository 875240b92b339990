//! Page/per-page listing for the collection endpoints.

use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Largest page a caller may ask for.
pub const MAX_PER_PAGE: usize = 100;

/// `?page=&per_page=` query parameters. Pages are 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
pub struct PageParams {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl PageParams {
    /// Resolve against the configured default page size.
    pub fn resolve(&self, default_per_page: usize) -> (usize, usize) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(default_per_page)
            .clamp(1, MAX_PER_PAGE);
        (page, per_page)
    }
}

/// One page of an ordered listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
}

impl<T> Page<T> {
    /// Slice `items`, which must already be in display order.
    pub fn of(items: Vec<T>, params: PageParams, default_per_page: usize) -> Self {
        let (page, per_page) = params.resolve(default_per_page);
        let total = items.len();
        let pages = total.div_ceil(per_page);
        let items = items
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Self {
            items,
            page,
            per_page,
            total,
            pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_requested_page() {
        let params = PageParams {
            page: Some(2),
            per_page: Some(3),
        };
        let page = Page::of((1..=8).collect::<Vec<_>>(), params, 20);
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 8);
        assert_eq!(page.pages, 3);
    }

    #[test]
    fn defaults_and_clamps() {
        let page = Page::of(vec![1, 2], PageParams::default(), 20);
        assert_eq!((page.page, page.per_page, page.pages), (1, 20, 1));

        let params = PageParams {
            page: Some(0),
            per_page: Some(10_000),
        };
        assert_eq!(params.resolve(20), (1, MAX_PER_PAGE));
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let params = PageParams {
            page: Some(5),
            per_page: Some(2),
        };
        let page = Page::of(vec![1, 2, 3], params, 20);
        assert!(page.items.is_empty());
        assert_eq!(page.pages, 2);
    }
}
