use reqwest::header::HeaderMap;
use reqwest::header::LINK;
use url::Url;

/// One page of a paginated listing.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// URL of the following page, if any.
    pub next: Option<String>,
    /// Number of the last page, when the server reports it.
    pub last_page: Option<u64>,
}

/// Target of the `Link` header entry with relation `rel`.
pub fn link(headers: &HeaderMap, rel: &str) -> Option<String> {
    let header = headers.get(LINK)?.to_str().ok()?;
    let rel_param = format!("rel=\"{}\"", rel);
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;
        parts
            .any(|param| param.trim() == rel_param)
            .then(|| target.to_string())
    })
}

/// Last page number from `Link: <...>; rel="last"`, or else GitLab's `x-total-pages`.
pub fn last_page(headers: &HeaderMap) -> Option<u64> {
    link(headers, "last").and_then(|url| page_number(&url)).or_else(|| {
        headers
            .get("x-total-pages")?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    })
}

fn page_number(url: &str) -> Option<u64> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}
