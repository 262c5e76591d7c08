//! Offset pagination primitives shared by repository read paths.
//!
//! A [`PageRequest`] captures the caller's `page`/`limit` pair and turns it
//! into a storage window (`skip`/`take`). A [`PageEnvelope`] wraps one fetched
//! window together with totals derived from a matching count query. Envelope
//! fields are computed fresh on every construction and never cached, so the
//! invariants below hold by construction:
//!
//! - `total_pages == total_count.div_ceil(limit)`
//! - `has_next == page * limit < total_count`
//! - `has_prev == page > 1`

use serde::{Deserialize, Serialize};

/// Page number used when the caller does not supply one.
pub const DEFAULT_PAGE: u32 = 1;

/// Window size used when the caller does not supply one.
pub const DEFAULT_LIMIT: u32 = 50;

/// Validation failures raised when constructing a [`PageRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PageRequestError {
    /// Pages are one-based; zero is not addressable.
    #[error("page must be at least 1")]
    ZeroPage,
    /// A zero limit would make every window empty and `total_pages` undefined.
    #[error("limit must be at least 1")]
    ZeroLimit,
}

/// A validated one-based `page`/`limit` pair.
///
/// # Examples
/// ```
/// use pagination::PageRequest;
///
/// let request = PageRequest::new(3, 20)?;
/// assert_eq!(request.offset(), 40);
/// # Ok::<(), pagination::PageRequestError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Construct a request, rejecting zero pages and zero limits.
    pub const fn new(page: u32, limit: u32) -> Result<Self, PageRequestError> {
        if page == 0 {
            return Err(PageRequestError::ZeroPage);
        }
        if limit == 0 {
            return Err(PageRequestError::ZeroLimit);
        }
        Ok(Self { page, limit })
    }

    /// One-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Maximum number of records in the window.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of records to skip before the window starts.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of results plus totals derived from a matching count query.
///
/// The window and the count are issued as a pair sharing one filter; the
/// envelope only does the arithmetic tying them together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<T> {
    /// Records inside the requested window, in query order.
    pub data: Vec<T>,
    /// One-based page number this window corresponds to.
    pub page: u32,
    /// Window size the caller asked for.
    pub limit: u32,
    /// Total records matching the filter across all pages.
    pub total_count: u64,
    /// Number of pages needed to cover `total_count` records.
    pub total_pages: u64,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_prev: bool,
}

impl<T> PageEnvelope<T> {
    /// Wrap one fetched window together with the total match count.
    #[must_use]
    pub fn new(data: Vec<T>, request: PageRequest, total_count: u64) -> Self {
        let page = u64::from(request.page());
        let limit = u64::from(request.limit());
        Self {
            data,
            page: request.page(),
            limit: request.limit(),
            total_count,
            total_pages: total_count.div_ceil(limit),
            has_next: page * limit < total_count,
            has_prev: request.page() > 1,
        }
    }

    /// Map the records while keeping the page arithmetic intact.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageEnvelope<U> {
        PageEnvelope {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total_count: self.total_count,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}
