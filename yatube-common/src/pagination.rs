//! Page arithmetic shared by every feed.

use serde::Serialize;

pub const PAGE_SIZE: u64 = 10;

/// The slice of rows a resolved page covers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Paginator {
    total_count: u64,
    per_page: u64,
}

impl Paginator {
    #[must_use]
    pub fn new(total_count: u64, per_page: u64) -> Self {
        Self {
            total_count,
            per_page: per_page.max(1),
        }
    }

    /// There is always at least one page, even when it is empty.
    #[must_use]
    pub fn num_pages(self) -> u64 {
        self.total_count.div_ceil(self.per_page).max(1)
    }

    /// Resolves the raw `page` query value.
    ///
    /// Missing or non-numeric values select the first page; numbers outside `1..=num_pages`
    /// select the last one.
    #[must_use]
    pub fn window(self, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages();
        let number = match requested.map(str::trim) {
            None => 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) => u64::try_from(n)
                    .ok()
                    .filter(|n| (1..=num_pages).contains(n))
                    .unwrap_or(num_pages),
                Err(_) if is_integer(raw) => num_pages,
                Err(_) => 1,
            },
        };

        PageWindow {
            number,
            offset: (number - 1) * self.per_page,
            limit: self.per_page,
        }
    }
}

/// An optionally signed run of ASCII digits, whatever its magnitude.
fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total_count: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, window: PageWindow, paginator: Paginator) -> Self {
        let num_pages = paginator.num_pages();
        Self {
            items,
            number: window.number,
            num_pages,
            total_count: paginator.total_count,
            has_next: window.number < num_pages,
            has_previous: window.number > 1,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
