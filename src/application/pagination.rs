//! Numbered page pagination shared by every post listing.
//!
//! Listings are ordered newest first before they reach this module; a page is a
//! contiguous slice `[(N - 1) * P, N * P)` of that ordering. Requests past the
//! last page yield an empty item list rather than an error.

use std::num::NonZeroU32;

use serde::Serialize;

/// Requested page number (1-based) and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: NonZeroU32,
}

impl PageRequest {
    /// Page numbers below 1 are normalised to the first page.
    pub fn new(number: u32, size: NonZeroU32) -> Self {
        Self {
            number: number.max(1),
            size,
        }
    }

    pub fn first(size: NonZeroU32) -> Self {
        Self::new(1, size)
    }

    /// Parse the raw `page` query value; anything unusable means page 1.
    pub fn from_query(raw: Option<&str>, size: NonZeroU32) -> Self {
        let number = raw
            .map(str::trim)
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(1);
        Self::new(number, size)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size.get())
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size.get())
    }
}

/// One page of an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub size: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Assemble a page from items already sliced by the caller (e.g. `LIMIT/OFFSET`).
    pub fn from_parts(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            items,
            number: request.number,
            size: request.size.get(),
            total_items,
            total_pages: total_pages(total_items, request.size),
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1 && self.total_pages > 0
    }

    pub fn next_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_number(&self) -> Option<u32> {
        self.has_previous()
            .then(|| (self.number - 1).min(self.total_pages))
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        (1..=self.total_pages).collect()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

/// Slice an already ordered sequence into the requested page.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let total_items = items.len() as u64;
    let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    let limit = request.size.get() as usize;
    let slice: Vec<T> = items.into_iter().skip(offset).take(limit).collect();
    Page::from_parts(slice, request, total_items)
}

fn total_pages(total_items: u64, size: NonZeroU32) -> u32 {
    let pages = total_items.div_ceil(u64::from(size.get()));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).expect("non-zero page size")
    }

    #[test]
    fn eleven_items_split_into_ten_and_one() {
        let items: Vec<u32> = (1..=11).collect();

        let first = paginate(items.clone(), PageRequest::new(1, size(10)));
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total_pages, 2);
        assert!(first.has_next());
        assert!(!first.has_previous());

        let second = paginate(items, PageRequest::new(2, size(10)));
        assert_eq!(second.items, vec![11]);
        assert!(!second.has_next());
        assert_eq!(second.previous_number(), Some(1));
    }

    #[test]
    fn last_page_holds_remainder_or_full_page() {
        for page_size in 1..=7u32 {
            for total in 1..=30u32 {
                let items: Vec<u32> = (0..total).collect();
                let pages = total.div_ceil(page_size);
                let last = paginate(items, PageRequest::new(pages, size(page_size)));
                let expected = match total % page_size {
                    0 => page_size,
                    rest => rest,
                };
                assert_eq!(
                    last.items.len() as u32,
                    expected,
                    "total={total} size={page_size}"
                );
            }
        }
    }

    #[test]
    fn page_beyond_range_is_empty_not_wrapped() {
        let items: Vec<u32> = (0..5).collect();
        let page = paginate(items, PageRequest::new(3, size(5)));
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_items, 5);
        assert!(!page.has_next());
    }

    #[test]
    fn empty_sequence_has_no_pages() {
        let page = paginate(Vec::<u32>::new(), PageRequest::first(size(10)));
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 0);
        assert!(page.page_numbers().is_empty());
        assert!(!page.has_previous());
    }

    #[test]
    fn query_values_fall_back_to_first_page() {
        assert_eq!(PageRequest::from_query(None, size(10)).number, 1);
        assert_eq!(PageRequest::from_query(Some(""), size(10)).number, 1);
        assert_eq!(PageRequest::from_query(Some("abc"), size(10)).number, 1);
        assert_eq!(PageRequest::from_query(Some("0"), size(10)).number, 1);
        assert_eq!(PageRequest::from_query(Some("-2"), size(10)).number, 1);
        assert_eq!(PageRequest::from_query(Some(" 3 "), size(10)).number, 3);
    }

    #[test]
    fn offset_and_limit_follow_page_number() {
        let request = PageRequest::new(3, size(10));
        assert_eq!(request.offset(), 20);
        assert_eq!(request.limit(), 10);
    }
}
