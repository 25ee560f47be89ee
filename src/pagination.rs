//! Page arithmetic for post listings.
//!
//! `Paginator::locate` turns a collection size and a raw `?page=` value into a
//! `PageWindow`; the storage layer then fetches only that window.

use serde::Deserialize;

/// Query string carrying the requested page, e.g. `/?page=2`.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: u64,
}

/// Where a requested page lands once clamped to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub offset: u64,
    pub limit: u64,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub previous: Option<u64>,
    pub next: Option<u64>,
}

impl Paginator {
    pub fn new(per_page: u64) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    /// The page number asked for, before clamping to the collection.
    /// Missing, non-numeric and non-positive input all mean page 1.
    pub fn requested_number(requested: Option<&str>) -> u64 {
        match requested.map(str::trim).map(str::parse::<i64>) {
            Some(Ok(n)) if n >= 1 => n as u64,
            _ => 1,
        }
    }

    /// Number of pages for `total` items. An empty collection still has one page.
    pub fn num_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.per_page).max(1)
    }

    /// Locate the requested page. Missing or non-numeric input means page 1;
    /// numbers outside `1..=num_pages` clamp to the nearest valid page.
    pub fn locate(&self, total: u64, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(total);
        let number = Self::requested_number(requested).min(num_pages);

        let offset = (number - 1) * self.per_page;
        let limit = self.per_page.min(total.saturating_sub(offset));

        PageWindow {
            number,
            num_pages,
            offset,
            limit,
            total,
        }
    }
}

impl PageWindow {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }
}

impl<T> Page<T> {
    pub fn new(window: PageWindow, items: Vec<T>) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total: window.total,
            previous: window.has_previous().then(|| window.number - 1),
            next: window.has_next().then(|| window.number + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
            previous: self.previous,
            next: self.next,
        }
    }
}
