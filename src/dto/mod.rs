pub mod candidate_dto;
pub mod employee_dto;
pub mod webhook_dto;

use serde::{Deserialize, Deserializer};

/// Distinguishes "field absent" (outer `None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies, so nullable columns can be cleared.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl Pagination {
    /// page >= 1, page_size clamped to 1..=200, defaults 1/50.
    pub fn clamped(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(50).clamp(1, 200);
        (page, page_size)
    }

    pub fn offset(&self) -> i64 {
        let (page, page_size) = self.clamped();
        (page - 1) * page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps() {
        let p = Pagination { page: Some(0), page_size: Some(1000) };
        assert_eq!(p.clamped(), (1, 200));
        let p = Pagination { page: None, page_size: None };
        assert_eq!(p.clamped(), (1, 50));
        let p = Pagination { page: Some(3), page_size: Some(20) };
        assert_eq!(p.offset(), 40);
    }
}
