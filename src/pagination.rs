use axum::http::Uri;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// PageQuery
///
/// Page-number pagination parameters accepted by every list endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Items per page (default 10, capped at 100).
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;
    pub const MAX_PAGE_SIZE: i64 = 100;

    pub fn page(&self) -> i64 {
        i64::from(self.page.unwrap_or(1).max(1))
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE as u32))
            .clamp(1, Self::MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Page
///
/// Paginated list envelope: total count, next/previous page links, and the
/// current page of results.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wraps one page of results, deriving the next/previous links from the
    /// request URI so filter and search parameters survive page navigation.
    pub fn new(count: i64, results: Vec<T>, query: &PageQuery, uri: &Uri) -> Self {
        let page = query.page();
        let limit = query.limit();
        let next = (page * limit < count).then(|| page_url(uri, page + 1));
        let previous = (page > 1).then(|| page_url(uri, page - 1));
        Page {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Rebuilds the request URI with the `page` parameter replaced.
fn page_url(uri: &Uri, page: i64) -> String {
    let mut pairs: Vec<(String, String)> = uri
        .query()
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (pair.to_string(), String::new()),
                })
                .filter(|(k, _)| k != "page")
                .collect()
        })
        .unwrap_or_default();
    pairs.push(("page".to_string(), page.to_string()));

    let query = pairs
        .into_iter()
        .map(|(k, v)| if v.is_empty() { k } else { format!("{k}={v}") })
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", uri.path(), query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_params_absent() {
        let query = PageQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), PageQuery::DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn page_size_is_capped() {
        let query = PageQuery {
            page: Some(3),
            page_size: Some(10_000),
        };
        assert_eq!(query.limit(), PageQuery::MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 2 * PageQuery::MAX_PAGE_SIZE);
    }

    #[test]
    fn links_preserve_other_query_params() {
        let uri: Uri = "/api/v1/titles?genre=rock&page=2&page_size=5"
            .parse()
            .unwrap();
        let query = PageQuery {
            page: Some(2),
            page_size: Some(5),
        };
        let page = Page::new(12, vec![0; 5], &query, &uri);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/v1/titles?genre=rock&page_size=5&page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/v1/titles?genre=rock&page_size=5&page=1")
        );
    }

    #[test]
    fn no_links_on_single_page() {
        let uri: Uri = "/api/v1/genres".parse().unwrap();
        let page = Page::new(3, vec![0; 3], &PageQuery::default(), &uri);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }
}
