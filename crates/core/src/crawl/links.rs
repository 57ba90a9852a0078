//! Anchor extraction from fetched pages.

use ::scraper::{Html, Selector};
use once_cell::sync::Lazy;
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Raw `href` values of every anchor, skipping empty and non-navigational ones.
pub fn extract_hrefs(body: &[u8]) -> Vec<String> {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    document
        .select(&ANCHOR)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| {
            !href.is_empty()
                && !href.starts_with('#')
                && !href.starts_with("javascript:")
                && !href.starts_with("mailto:")
        })
        .map(str::to_string)
        .collect()
}

/// Resolve `href` against the page URL, keeping http(s) targets only.
pub fn resolve_href(page: &Url, href: &str) -> Option<Url> {
    let mut url = page.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_hrefs() {
        let html = br##"<html><body>
            <a href="/thread-1.htm">t1</a>
            <a href=" attach-2.htm ">a2</a>
            <a href="#top">top</a>
            <a href="javascript:void(0)">js</a>
            <a href="mailto:x@y.z">mail</a>
            <a>no href</a>
        </body></html>"##;

        assert_eq!(extract_hrefs(html), vec!["/thread-1.htm", "attach-2.htm"]);
    }

    #[test]
    fn test_resolve_href() {
        let page = Url::parse("http://example.com/forum/index.htm").unwrap();

        assert_eq!(
            resolve_href(&page, "thread-1.htm#p3").unwrap().as_str(),
            "http://example.com/forum/thread-1.htm"
        );
        assert_eq!(
            resolve_href(&page, "/attach-1").unwrap().as_str(),
            "http://example.com/attach-1"
        );
        assert_eq!(
            resolve_href(&page, "https://cdn.example.com/a.zip").unwrap().as_str(),
            "https://cdn.example.com/a.zip"
        );
        assert!(resolve_href(&page, "ftp://example.com/a").is_none());
    }
}
