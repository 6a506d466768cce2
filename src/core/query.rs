//! Response envelope and pagination utilities
//!
//! Every backend response is wrapped in `{ success, message, data }`.
//! Collection reads take a zero-based page index and a page size and answer
//! with a Spring-style page:
//!
//! ```text
//! GET /organization?page=0&size=5
//! { "success": true, "message": "...",
//!   "data": { "content": [...], "totalElements": 12, "totalPages": 3, "size": 5, "number": 0 } }
//! ```

use crate::core::error::ApiError;
use serde::{Deserialize, Serialize};

/// Response envelope shared by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    /// Absent or null on most failures
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload of a successful envelope
    ///
    /// A `success: false` envelope, or one without data, becomes
    /// [`ApiError::Rejected`] carrying the backend message.
    pub fn into_data(self) -> Result<T, ApiError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(ApiError::Rejected {
                message: self.message,
            }),
        }
    }
}

/// One page of a collection read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub size: u32,
    /// Zero-based index of this page
    pub number: u32,
}

/// Page coordinates of a collection read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page index
    pub page: u32,
    /// Number of items per page
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// Query string pairs in wire order
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("page".to_string(), self.page.to_string()),
            ("size".to_string(), self.size.to_string()),
        ]
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// Page size used by the organization table on first render
pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Page sizes offered by the page size selector
pub const PAGE_SIZE_OPTIONS: [u32; 5] = [5, 10, 20, 50, 100];

/// Above this many pages the pager switches to a sliding window
const FULL_PAGER_LIMIT: u32 = 7;

/// Width of the sliding pager window
const PAGER_WINDOW: u32 = 5;

/// One button of the pager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerItem {
    /// Zero-based page index
    Page(u32),
    Ellipsis,
}

/// Client-side pagination state of one table
///
/// Changing the page size always resets the current page to zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    page: u32,
    size: u32,
    total_elements: u64,
    total_pages: u32,
}

impl PaginationState {
    pub fn new(size: u32) -> Self {
        Self {
            page: 0,
            size: size.max(1),
            total_elements: 0,
            total_pages: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// The request for the current coordinates
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.size)
    }

    /// Record the totals reported by the last response
    pub fn apply<T>(&mut self, page: &Page<T>) {
        self.total_elements = page.total_elements;
        self.total_pages = page.total_pages;
    }

    /// Jump to a page, clamped to the known page range
    pub fn set_page(&mut self, page: u32) {
        self.page = if self.total_pages == 0 {
            page
        } else {
            page.min(self.total_pages - 1)
        };
    }

    /// Change the page size and go back to the first page
    ///
    /// A zero size is ignored. Returns whether the state changed.
    pub fn set_page_size(&mut self, size: u32) -> bool {
        if size == 0 {
            return false;
        }
        let changed = size != self.size || self.page != 0;
        self.size = size;
        self.page = 0;
        changed
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.total_pages > 0 && self.page + 1 < self.total_pages
    }

    pub fn next(&mut self) {
        if self.has_next() {
            self.page += 1;
        }
    }

    pub fn previous(&mut self) {
        if self.has_previous() {
            self.page -= 1;
        }
    }

    pub fn first(&mut self) {
        self.page = 0;
    }

    pub fn last(&mut self) {
        self.page = self.total_pages.saturating_sub(1);
    }

    /// One-based inclusive range of the rows on the current page
    ///
    /// `page * size + 1 ..= min((page + 1) * size, total)`, or `None` when
    /// the current page holds no rows.
    pub fn range(&self) -> Option<(u64, u64)> {
        let size = u64::from(self.size);
        let start = u64::from(self.page) * size + 1;
        if start > self.total_elements {
            return None;
        }
        let end = ((u64::from(self.page) + 1) * size).min(self.total_elements);
        Some((start, end))
    }

    /// Range label shown above a table, e.g. `6 ~ 10 of 12`
    pub fn range_label(&self) -> String {
        match self.range() {
            Some((start, end)) => format!("{} ~ {} of {}", start, end, self.total_elements),
            None => format!("0 ~ 0 of {}", self.total_elements),
        }
    }

    /// Pager buttons for the current position
    ///
    /// Every page is listed up to seven pages. Beyond that a five-page window
    /// around the current page is shown, with the first and last page and
    /// ellipses when they fall outside the window.
    pub fn pager(&self) -> Vec<PagerItem> {
        let total = self.total_pages;
        if total <= FULL_PAGER_LIMIT {
            return (0..total).map(PagerItem::Page).collect();
        }

        let current = self.page.min(total - 1);
        let window_start = current.saturating_sub(2).min(total - PAGER_WINDOW);
        let mut items = Vec::with_capacity(PAGER_WINDOW as usize + 4);

        if current > 2 {
            items.push(PagerItem::Page(0));
        }
        if current > 3 {
            items.push(PagerItem::Ellipsis);
        }
        items.extend((window_start..window_start + PAGER_WINDOW).map(PagerItem::Page));
        if current + 4 < total {
            items.push(PagerItem::Ellipsis);
        }
        if current + 3 < total {
            items.push(PagerItem::Page(total - 1));
        }
        items
    }
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
