//! Page/size pagination for the listing endpoints that can grow large.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SIZE: u32 = 50;
pub const MAX_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    DEFAULT_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_size(),
        }
    }
}

impl PageParams {
    /// Page size clamped to `1..=MAX_SIZE`.
    pub fn size(&self) -> u32 {
        self.size.clamp(1, MAX_SIZE)
    }

    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * self.limit()
    }
}

/// One page of results plus neighbouring page numbers.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub next_page: Option<u32>,
    pub previous_page: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PageParams) -> Self {
        let page = params.page();
        let size = i64::from(params.size());
        let has_next = size * i64::from(page) < total;
        Self {
            items,
            total,
            next_page: has_next.then(|| page + 1),
            previous_page: (page > 1).then(|| page - 1),
        }
    }
}
