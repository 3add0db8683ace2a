pub mod accounts;
pub mod admin;
pub mod lessons;

use serde::Deserialize;

/// `?page=` for paged listings. Pages start at 1; 0 and missing mean 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
}

impl PageParams {
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}
