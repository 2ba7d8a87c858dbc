//! Page requests and paged results.
//!
//! # Invariants
//! - A request window always has `limit > 0`.
//! - `Page` totals come from a separate count statement; `Slice` never
//!   counts and instead over-fetches one row to learn `has_next`.

use crate::query::{OrderSpec, QuerySpecError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    offset: u64,
    limit: u64,
    ordering: Vec<OrderSpec>,
}

impl PageRequest {
    /// Window of `limit` rows starting at row `offset`.
    pub fn new(offset: u64, limit: u64) -> Result<Self, QuerySpecError> {
        if limit == 0 {
            return Err(QuerySpecError::InvalidWindow(
                "page size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            offset,
            limit,
            ordering: Vec::new(),
        })
    }

    /// Zero-based page `page` of `size` rows.
    pub fn of(page: u64, size: u64) -> Result<Self, QuerySpecError> {
        let offset = page.checked_mul(size).ok_or_else(|| {
            QuerySpecError::InvalidWindow(format!("page {page} of size {size} overflows"))
        })?;
        Self::new(offset, size)
    }

    /// Replaces the request ordering.
    pub fn sorted_by(mut self, ordering: impl IntoIterator<Item = OrderSpec>) -> Self {
        self.ordering = ordering.into_iter().collect();
        self
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn ordering(&self) -> &[OrderSpec] {
        &self.ordering
    }

    /// Zero-based page number; partial offsets round down.
    pub fn page_number(&self) -> u64 {
        self.offset / self.limit
    }

    /// The following window with the same size and ordering.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
            ordering: self.ordering.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    content: Vec<T>,
    total_elements: u64,
    offset: u64,
    limit: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: u64, request: &PageRequest) -> Self {
        Self {
            content,
            total_elements,
            offset: request.offset(),
            limit: request.limit(),
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(self.limit)
    }

    pub fn number(&self) -> u64 {
        self.offset / self.limit
    }

    pub fn is_first(&self) -> bool {
        self.offset == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn has_next(&self) -> bool {
        self.offset + (self.content.len() as u64) < self.total_elements
    }

    pub fn has_previous(&self) -> bool {
        self.offset > 0
    }

    /// Converts the content, keeping totals and window.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice<T> {
    content: Vec<T>,
    offset: u64,
    limit: u64,
    has_next: bool,
}

impl<T> Slice<T> {
    /// Builds a slice from `limit + 1` fetched rows, dropping the probe row.
    pub fn from_probe(mut rows: Vec<T>, request: &PageRequest) -> Self {
        let limit = usize::try_from(request.limit()).unwrap_or(usize::MAX);
        let has_next = rows.len() > limit;
        rows.truncate(limit);
        Self {
            content: rows,
            offset: request.offset(),
            limit: request.limit(),
            has_next,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn is_first(&self) -> bool {
        self.offset == 0
    }

    pub fn number(&self) -> u64 {
        self.offset / self.limit
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            offset: self.offset,
            limit: self.limit,
            has_next: self.has_next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Page, PageRequest, Slice};
    use crate::query::{Field, QuerySpecError};

    #[test]
    fn page_math_for_partial_last_page() {
        let request = PageRequest::of(0, 3).unwrap();
        let page = Page::new(vec![1, 2, 3], 5, &request);
        assert_eq!(page.total_pages(), 2);
        assert!(page.is_first());
        assert!(page.has_next());
        assert!(!page.has_previous());

        let last = Page::new(vec![4, 5], 5, &request.next());
        assert_eq!(last.number(), 1);
        assert!(last.is_last());
        assert!(last.has_previous());
    }

    #[test]
    fn empty_total_has_zero_pages() {
        let page: Page<i32> = Page::new(Vec::new(), 0, &PageRequest::new(0, 10).unwrap());
        assert_eq!(page.total_pages(), 0);
        assert!(page.is_last());
    }

    #[test]
    fn map_keeps_totals() {
        let request = PageRequest::new(1, 2).unwrap();
        let page = Page::new(vec![10, 20], 4, &request).map(|age| age * 2);
        assert_eq!(page.content(), [20, 40]);
        assert_eq!(page.total_elements(), 4);

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["total_elements"], 4);
        assert_eq!(json["content"], serde_json::json!([20, 40]));
    }

    #[test]
    fn slice_uses_probe_row_for_has_next() {
        let request = PageRequest::new(0, 2).unwrap();
        let slice = Slice::from_probe(vec!["a", "b", "c"], &request);
        assert_eq!(slice.content(), ["a", "b"]);
        assert!(slice.has_next());

        let tail = Slice::from_probe(vec!["c"], &request.next());
        assert!(!tail.has_next());
        assert_eq!(tail.number(), 1);
    }

    #[test]
    fn invalid_windows_fail_at_construction() {
        assert!(matches!(
            PageRequest::new(0, 0),
            Err(QuerySpecError::InvalidWindow(_))
        ));
        assert!(matches!(
            PageRequest::of(u64::MAX, 2),
            Err(QuerySpecError::InvalidWindow(_))
        ));
        let request = PageRequest::of(2, 5)
            .unwrap()
            .sorted_by([Field::Username.desc()]);
        assert_eq!(request.offset(), 10);
        assert_eq!(request.page_number(), 2);
        assert_eq!(request.ordering().len(), 1);
    }
}
