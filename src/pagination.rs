use axum::http::Uri;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page-number pagination parameters, 1-based.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}
fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageParams {
    /// Build from the optional query parameters list endpoints accept.
    pub fn from_parts(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// List envelope: `{count, next, previous, results}` with page links rebuilt
/// from the request URI.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: i64, params: PageParams, uri: &Uri) -> Self {
        let last_page = if count == 0 {
            1
        } else {
            (count + params.page_size - 1) / params.page_size
        };
        let next = (params.page < last_page).then(|| page_link(uri, params.page + 1));
        let previous = (params.page > 1).then(|| page_link(uri, params.page - 1));
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

// Path plus query with the `page` pair replaced; other parameters survive.
fn page_link(uri: &Uri, page: i64) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("page=") && *p != "page")
        .map(str::to_string)
        .collect();
    pairs.push(format!("page={page}"));
    format!("{}?{}", uri.path(), pairs.join("&"))
}

/// Translate a DRF-style `ordering` parameter (leading `-` for descending)
/// into an ORDER BY clause restricted to the allowed columns. Unknown fields
/// fall back to the default ordering.
pub fn order_clause(ordering: Option<&str>, allowed: &[&str], default: &str) -> String {
    let Some(raw) = ordering.map(str::trim).filter(|s| !s.is_empty()) else {
        return default.to_string();
    };
    let (field, direction) = match raw.strip_prefix('-') {
        Some(field) => (field, "DESC"),
        None => (raw, "ASC"),
    };
    if allowed.contains(&field) {
        format!("{field} {direction}")
    } else {
        default.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn first_page_of_many_has_next_only() {
        let params = PageParams {
            page: 1,
            page_size: 50,
        };
        let page = Page::new(vec![0u8; 50], 100, params, &uri("/api/goals/goals?page_size=50"));
        assert_eq!(page.count, 100);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/goals/goals?page_size=50&page=2")
        );
        assert!(page.previous.is_none());
        assert_eq!(page.results.len(), 50);
    }

    #[test]
    fn last_page_has_previous_only() {
        let params = PageParams {
            page: 2,
            page_size: 50,
        };
        let page = Page::new(vec![0u8; 50], 100, params, &uri("/api/goals/goals?page=2&page_size=50"));
        assert!(page.next.is_none());
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/goals/goals?page_size=50&page=1")
        );
    }

    #[test]
    fn partial_last_page_is_reachable() {
        // 100 items at 30 per page: pages 1-4, the 4th holding the remainder.
        let params = PageParams {
            page: 3,
            page_size: 30,
        };
        let page = Page::new(vec![0u8; 30], 100, params, &uri("/x?page=3"));
        assert_eq!(page.next.as_deref(), Some("/x?page=4"));
    }

    #[test]
    fn empty_collection_has_no_links() {
        let page = Page::<u8>::new(vec![], 0, PageParams::default(), &uri("/x"));
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
        assert_eq!(page.count, 0);
    }

    #[test]
    fn clamp_bounds_page_and_size() {
        let params = PageParams {
            page: 0,
            page_size: 5000,
        }
        .clamped();
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn ordering_accepts_whitelisted_fields() {
        let allowed = &["created_at", "target_date"];
        assert_eq!(
            order_clause(Some("target_date"), allowed, "created_at DESC"),
            "target_date ASC"
        );
        assert_eq!(
            order_clause(Some("-target_date"), allowed, "created_at DESC"),
            "target_date DESC"
        );
    }

    #[test]
    fn ordering_rejects_unknown_fields() {
        let allowed = &["created_at"];
        assert_eq!(
            order_clause(Some("password_hash"), allowed, "created_at DESC"),
            "created_at DESC"
        );
        assert_eq!(order_clause(None, allowed, "created_at DESC"), "created_at DESC");
    }
}
