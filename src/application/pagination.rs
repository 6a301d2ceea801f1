//! Page-number pagination shared by list payloads.

use serde::Serialize;

use crate::application::repos::Window;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;

/// Parse an integer query parameter, clamping it into `[min, max]`.
///
/// Missing or non-numeric input yields `default` before clamping.
pub fn parse_clamped(raw: Option<&str>, default: i64, min: i64, max: Option<i64>) -> i64 {
    let value = raw
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(default);
    let value = value.max(min);
    match max {
        Some(max) => value.min(max),
        None => value,
    }
}

/// Parse a boolean flag. Only `1`, `true` and `yes` (any case) are truthy.
pub fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(|value| value.trim().to_ascii_lowercase())
        .is_some_and(|value| matches!(value.as_str(), "1" | "true" | "yes"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub per_page: u64,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageParams {
    pub fn from_query(page: Option<&str>, per_page: Option<&str>) -> Self {
        let page = parse_clamped(page, DEFAULT_PAGE as i64, 1, None);
        let per_page = parse_clamped(
            per_page,
            DEFAULT_PER_PAGE as i64,
            1,
            Some(MAX_PER_PAGE as i64),
        );
        Self {
            page: page as u64,
            per_page: per_page as u64,
        }
    }

    /// Settle on a page that exists for `total` rows. Requests past the end land on the last page.
    pub fn resolve(self, total: u64) -> ResolvedPage {
        let pages = total.div_ceil(self.per_page).max(1);
        let page = self.page.min(pages);
        ResolvedPage {
            page,
            per_page: self.per_page,
            total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPage {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

impl ResolvedPage {
    pub fn window(&self) -> Window {
        Window {
            offset: (self.page - 1) * self.per_page,
            limit: self.per_page,
        }
    }

    /// Slice an already ordered in-memory result.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let window = self.window();
        items
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect()
    }

    pub fn summary(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let params = PageParams::from_query(Some("abc"), Some(""));
        assert_eq!(params, PageParams::default());
        assert_eq!(PageParams::from_query(None, None), PageParams::default());
    }

    #[test]
    fn values_are_clamped() {
        let params = PageParams::from_query(Some("-4"), Some("500"));
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, MAX_PER_PAGE);

        let params = PageParams::from_query(Some("3"), Some("0"));
        assert_eq!(params.page, 3);
        assert_eq!(params.per_page, 1);
    }

    #[test]
    fn pages_past_the_end_land_on_the_last_page() {
        let resolved = PageParams::from_query(Some("9"), Some("10")).resolve(25);
        assert_eq!(resolved.page, 3);
        assert_eq!(resolved.window(), Window { offset: 20, limit: 10 });
        assert_eq!(resolved.slice((0..25).collect::<Vec<_>>()), (20..25).collect::<Vec<_>>());
    }

    #[test]
    fn empty_results_still_report_page_one() {
        let resolved = PageParams::from_query(Some("4"), None).resolve(0);
        assert_eq!(
            resolved.summary(),
            Pagination {
                page: 1,
                per_page: DEFAULT_PER_PAGE,
                total: 0
            }
        );
    }

    #[test]
    fn flags_accept_common_truthy_spellings() {
        for raw in ["1", "true", "YES", " True "] {
            assert!(parse_flag(Some(raw)), "{raw}");
        }
        for raw in ["0", "no", "on", ""] {
            assert!(!parse_flag(Some(raw)), "{raw}");
        }
        assert!(!parse_flag(None));
    }
}
