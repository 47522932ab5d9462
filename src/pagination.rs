use serde::Serialize;

/// Stands in for the last page before the row count is known.
pub const LAST_PAGE: i64 = 0;

/// The page a raw `?page=` value asks for without knowing the row count:
/// garbage is page 1 and anything below 1 is [`LAST_PAGE`].
pub fn requested_page(raw: Option<&str>) -> i64 {
    match raw.and_then(|r| r.trim().parse::<i64>().ok()) {
        None => 1,
        Some(number) if number < 1 => LAST_PAGE,
        Some(number) => number,
    }
}

/// Splits `count` rows into pages of `per_page`.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    /// Always at least one page, even with no rows.
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Resolve the raw `?page=` value. Garbage means the first page,
    /// anything out of range means the last one.
    pub fn get_page(&self, raw: Option<&str>) -> i64 {
        match requested_page(raw) {
            LAST_PAGE => self.num_pages(),
            number if number > self.num_pages() => self.num_pages(),
            number => number,
        }
    }

    pub fn offset(&self, number: i64) -> i64 {
        (number - 1) * self.per_page
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    pub fn page<T>(&self, items: Vec<T>, number: i64) -> Page<T> {
        let num_pages = self.num_pages();
        Page {
            items,
            number,
            num_pages,
            count: self.count,
            has_previous: number > 1,
            has_next: number < num_pages,
            previous_page_number: (number > 1).then(|| number - 1),
            next_page_number: (number < num_pages).then(|| number + 1),
            page_range: (1..=num_pages).collect(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<i64>,
    pub next_page_number: Option<i64>,
    pub page_range: Vec<i64>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
