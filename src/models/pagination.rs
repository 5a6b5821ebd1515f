use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 6;
pub const MAX_PAGE: i64 = 100_000;

#[derive(Debug, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_page_bound"))]
pub struct PaginationQuery {
    #[validate(range(min = 1, message = "page must not be less than 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

impl PaginationQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(DEFAULT_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    /// Rows to skip. Saturates instead of overflowing on unvalidated input.
    pub fn offset(&self) -> i64 {
        (self.page() - 1).max(0).saturating_mul(self.limit().max(0))
    }
}

fn validate_page_bound(query: &PaginationQuery) -> Result<(), ValidationError> {
    if query.page() > MAX_PAGE {
        return Err(ValidationError::new("max_page")
            .with_message(Cow::Borrowed("page must not be greater than 100000")));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, query: &PaginationQuery) -> Self {
        let limit = query.limit();
        Self {
            data,
            total,
            page: query.page(),
            limit,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_of_six() {
        let q = PaginationQuery::default();
        assert_eq!((q.page(), q.limit(), q.offset()), (1, 6, 0));
    }

    #[test]
    fn total_pages_rounds_up() {
        let q = PaginationQuery { page: Some(3), limit: Some(4) };
        assert_eq!(q.offset(), 8);
        let page = Page::new(vec![1, 2], 10, &q);
        assert_eq!(page.total_pages, 3);
        assert_eq!(Page::<u8>::new(vec![], 0, &q).total_pages, 0);
    }

    #[test]
    fn rejects_zero_page() {
        let q = PaginationQuery { page: Some(0), limit: None };
        assert!(q.validate().is_err());
    }

    #[test]
    fn rejects_page_past_the_bound() {
        let q = PaginationQuery { page: Some(i64::MAX), limit: Some(6) };
        assert!(q.validate().is_err());
        // never panics, even when validation was skipped
        assert_eq!(q.offset(), i64::MAX);

        let last = PaginationQuery { page: Some(MAX_PAGE), limit: Some(100) };
        assert!(last.validate().is_ok());
        assert_eq!(last.offset(), (MAX_PAGE - 1) * 100);
    }
}
