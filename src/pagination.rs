use serde::Deserialize;

/// Page size for every list query.
pub const PAGE_LIMIT: u32 = 10;

#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Anything missing, unparseable or below 1 is page 1.
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(1)
            .max(1)
    }
}

/// Where the user is in the list. Never stored, always rebuilt from the latest response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
    pub total_count: u64,
}

impl PageWindow {
    pub fn new(page: u32, total_count: u64) -> Self {
        Self {
            page: page.max(1),
            limit: PAGE_LIMIT,
            total_count,
        }
    }

    pub fn total_pages(&self) -> u32 {
        let pages = self.total_count.div_ceil(u64::from(self.limit));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn items_on_page(&self) -> u64 {
        let before = u64::from(self.page - 1) * u64::from(self.limit);
        self.total_count
            .saturating_sub(before)
            .min(u64::from(self.limit))
    }

    /// Page to show once a single row has been removed from this page.
    pub fn page_after_removal(&self) -> u32 {
        if self.page > 1 && self.page == self.total_pages() && self.items_on_page() == 1 {
            self.page - 1
        } else {
            self.page
        }
    }

    /// Last page once one more student exists. Computed before the add and carried along,
    /// as a full last page means the new student opens a fresh one.
    pub fn page_for_new_item(&self) -> u32 {
        if self.total_count % u64::from(self.limit) == 0 {
            self.total_pages() + 1
        } else {
            self.total_pages()
        }
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        1..=self.total_pages()
    }
}
