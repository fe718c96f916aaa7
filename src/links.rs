//! Link discovery on edition index and layout pages.
//!
//! Both extractors share one routine: find a container element, walk the
//! items inside it in document order, read each item's `href`, and resolve
//! it against the page's URL.
//!
//! Selector lists are tried in order, current markup first and legacy markup
//! after, independently for every page. The archives span a site redesign,
//! and the same edition may be served in either format.

use crate::config::LinkSelector;
use crate::error::ParseFailure;
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use tracing::{debug, instrument, warn};
use url::Url;

/// Which level of the archive a link points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// Edition index -> layout page.
    Layout,
    /// Layout page -> article page.
    Article,
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRole::Layout => write!(f, "layout"),
            LinkRole::Article => write!(f, "article"),
        }
    }
}

/// Layout page URLs listed on an edition index page, in document order.
pub fn extract_layout_links(
    markup: &str,
    base_url: &str,
    selectors: &[LinkSelector],
) -> Result<Vec<String>, ParseFailure> {
    extract_links(markup, base_url, selectors, LinkRole::Layout)
}

/// Article URLs listed on a layout page, in document order.
pub fn extract_article_links(
    markup: &str,
    base_url: &str,
    selectors: &[LinkSelector],
) -> Result<Vec<String>, ParseFailure> {
    extract_links(markup, base_url, selectors, LinkRole::Article)
}

/// Run the selector fallback chain over `markup`.
///
/// Returns the links of the first selector that yields any. A container that
/// exists but holds no links lets the next selector try; if every selector
/// comes up empty the result is an empty list, and if no container was found
/// at all the page is reported as [`ParseFailure::MissingElement`]. A selector
/// that does not parse is skipped with a warning; only when none of them
/// parses is the result [`ParseFailure::InvalidSelector`].
#[instrument(level = "debug", skip(markup, selectors), fields(bytes = markup.len()))]
pub fn extract_links(
    markup: &str,
    base_url: &str,
    selectors: &[LinkSelector],
    role: LinkRole,
) -> Result<Vec<String>, ParseFailure> {
    let base = Url::parse(base_url).map_err(|_| ParseFailure::InvalidBaseUrl(base_url.to_string()))?;
    let anchor = parse_selector("a[href]")?;
    let document = Html::parse_document(markup);
    let mut container_found = false;
    let mut invalid = None;
    let mut usable = 0;

    for link_selector in selectors {
        let (container, item) = match (
            parse_selector(&link_selector.container),
            parse_selector(&link_selector.item),
        ) {
            (Ok(container), Ok(item)) => (container, item),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Skipping unusable link selector");
                invalid.get_or_insert(e);
                continue;
            }
        };
        usable += 1;

        let mut containers = document.select(&container).peekable();
        if containers.peek().is_none() {
            debug!(container = %link_selector.container, "Container not found; trying next selector");
            continue;
        }
        container_found = true;

        let links: Vec<String> = containers
            .flat_map(|root| root.select(&item))
            .filter_map(|el| item_href(el, &anchor))
            .filter_map(|href| resolve(&base, href))
            .unique()
            .collect();

        if !links.is_empty() {
            debug!(
                container = %link_selector.container,
                %role,
                count = links.len(),
                "Extracted links"
            );
            return Ok(links);
        }
        debug!(container = %link_selector.container, "Container holds no links; trying next selector");
    }

    if container_found {
        Ok(Vec::new())
    } else if let (0, Some(e)) = (usable, invalid) {
        Err(e)
    } else {
        Err(ParseFailure::MissingElement(
            selectors.iter().map(|s| s.container.as_str()).join(" | "),
        ))
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ParseFailure> {
    Selector::parse(selector).map_err(|_| ParseFailure::InvalidSelector(selector.to_string()))
}

/// The item's own `href` when it is an anchor, else its first descendant anchor's.
fn item_href<'a>(item: ElementRef<'a>, anchor: &Selector) -> Option<&'a str> {
    let href = if item.value().name() == "a" {
        item.value().attr("href")
    } else {
        item.select(anchor).next().and_then(|a| a.value().attr("href"))
    }?;

    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        None
    } else {
        Some(href)
    }
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;

    const INDEX_URL: &str = "http://paper.people.com.cn/rmrb/html/2024-01/02/nbs.D110000renmrb_01.htm";

    const CURRENT_INDEX: &str = r#"
        <html><body>
          <div class="swiper-container">
            <div class="swiper-wrapper">
              <div class="swiper-slide"><a href="nbs.D110000renmrb_01.htm">01版：要闻</a></div>
              <div class="swiper-slide"><a href="nbs.D110000renmrb_02.htm">02版：要闻</a></div>
              <div class="swiper-slide"><a href="nbs.D110000renmrb_03.htm">03版：要闻</a></div>
            </div>
          </div>
        </body></html>
    "#;

    const LEGACY_INDEX: &str = r#"
        <html><body>
          <div id="pageList">
            <ul>
              <li><a id="pageLink" href="nbs.D110000renmrb_01.htm">第01版：要闻</a></li>
              <li><a id="pageLink" href="nbs.D110000renmrb_02.htm">第02版：要闻</a></li>
              <li><a id="pageLink" href="nbs.D110000renmrb_03.htm">第03版：要闻</a></li>
            </ul>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_current_layout_links_resolve_in_document_order() {
        let profile = SiteProfile::peoples_daily();
        let links = extract_layout_links(CURRENT_INDEX, INDEX_URL, &profile.layout_selectors).unwrap();
        assert_eq!(
            links,
            vec![
                "http://paper.people.com.cn/rmrb/html/2024-01/02/nbs.D110000renmrb_01.htm",
                "http://paper.people.com.cn/rmrb/html/2024-01/02/nbs.D110000renmrb_02.htm",
                "http://paper.people.com.cn/rmrb/html/2024-01/02/nbs.D110000renmrb_03.htm",
            ]
        );
    }

    #[test]
    fn test_legacy_layout_markup_yields_same_links() {
        let profile = SiteProfile::peoples_daily();
        let current = extract_layout_links(CURRENT_INDEX, INDEX_URL, &profile.layout_selectors).unwrap();
        let legacy = extract_layout_links(LEGACY_INDEX, INDEX_URL, &profile.layout_selectors).unwrap();
        assert_eq!(current, legacy);
    }

    #[test]
    fn test_article_links_current_and_legacy() {
        let profile = SiteProfile::peoples_daily();
        let layout_url = "http://paper.people.com.cn/rmrb/html/2024-01/02/nbs.D110000renmrb_01.htm";
        let current = r#"
            <div class="news">
              <ul class="news-list">
                <li><a href="nw.D110000renmrb_20240102_1-01.htm">First story</a></li>
                <li><a href="nw.D110000renmrb_20240102_2-01.htm">Second story</a></li>
              </ul>
            </div>
        "#;
        let legacy = r#"
            <div id="titleList">
              <ul>
                <li><a href="nw.D110000renmrb_20240102_1-01.htm"><script>document.write(view("First story"))</script></a></li>
                <li><a href="nw.D110000renmrb_20240102_2-01.htm"><script>document.write(view("Second story"))</script></a></li>
              </ul>
            </div>
        "#;

        let a = extract_article_links(current, layout_url, &profile.article_link_selectors).unwrap();
        let b = extract_article_links(legacy, layout_url, &profile.article_link_selectors).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(
            a[0],
            "http://paper.people.com.cn/rmrb/html/2024-01/02/nw.D110000renmrb_20240102_1-01.htm"
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_xinhua_takes_first_anchor_of_each_item() {
        let profile = SiteProfile::xinhua_daily();
        let index = "https://xh.xhby.net/pc/layout/202410/27/node_1.html";
        let markup = r#"
            <div class="Chunkiconlist">
              <p><a href="node_1.html">第A1版：一版要闻</a><a href="../../../pdf/202410/27/A1.pdf">PDF</a></p>
              <p><a href="node_2.html">第A2版：要闻</a><a href="../../../pdf/202410/27/A2.pdf">PDF</a></p>
            </div>
        "#;
        let links = extract_layout_links(markup, index, &profile.layout_selectors).unwrap();
        assert_eq!(
            links,
            vec![
                "https://xh.xhby.net/pc/layout/202410/27/node_1.html",
                "https://xh.xhby.net/pc/layout/202410/27/node_2.html",
            ]
        );
    }

    #[test]
    fn test_parent_relative_hrefs_resolve() {
        let profile = SiteProfile::xinhua_daily();
        let layout = "https://xh.xhby.net/pc/layout/202410/27/node_2.html";
        let markup = r#"
            <div class="newslist"><ul>
              <li><a href="../../../content/202410/27/content_1.html">Story</a></li>
            </ul></div>
        "#;
        let links = extract_article_links(markup, layout, &profile.article_link_selectors).unwrap();
        assert_eq!(links, vec!["https://xh.xhby.net/pc/content/202410/27/content_1.html"]);
    }

    #[test]
    fn test_skips_unusable_hrefs_and_duplicates() {
        let selectors = vec![LinkSelector::new(".swiper-container", "a")];
        let markup = r##"
            <div class="swiper-container">
              <a href="javascript:void(0)">prev</a>
              <a href="#top">top</a>
              <a href="p1.htm">1</a>
              <a>no href</a>
              <a href="p2.htm">2</a>
              <a href="p1.htm">1 (loop copy)</a>
            </div>
        "##;
        let links = extract_layout_links(markup, "http://example.com/e/index.htm", &selectors).unwrap();
        assert_eq!(
            links,
            vec!["http://example.com/e/p1.htm", "http://example.com/e/p2.htm"]
        );
    }

    #[test]
    fn test_missing_container_is_parse_failure() {
        let profile = SiteProfile::peoples_daily();
        let result = extract_layout_links(
            "<html><body><p>404 Not Found</p></body></html>",
            INDEX_URL,
            &profile.layout_selectors,
        );
        assert_eq!(
            result,
            Err(ParseFailure::MissingElement(".swiper-container | #pageList".into()))
        );
    }

    #[test]
    fn test_empty_container_is_empty_list() {
        let profile = SiteProfile::peoples_daily();
        let result = extract_article_links(
            r#"<ul class="news-list"></ul>"#,
            INDEX_URL,
            &profile.article_link_selectors,
        );
        assert_eq!(result, Ok(vec![]));
    }

    #[test]
    fn test_invalid_selector_is_parse_failure() {
        let selectors = vec![LinkSelector::new("div[", "a")];
        let result = extract_layout_links("<div></div>", INDEX_URL, &selectors);
        assert_eq!(result, Err(ParseFailure::InvalidSelector("div[".into())));
    }

    #[test]
    fn test_invalid_selector_falls_through_to_legacy() {
        let selectors = vec![
            LinkSelector::new("div[", "a"),
            LinkSelector::new("#pageList", "li"),
        ];
        let links = extract_layout_links(LEGACY_INDEX, INDEX_URL, &selectors).unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(
            links[0],
            "http://paper.people.com.cn/rmrb/html/2024-01/02/nbs.D110000renmrb_01.htm"
        );

        let selectors = vec![
            LinkSelector::new(".swiper-container", "a["),
            LinkSelector::new("#missing", "li"),
        ];
        let result = extract_layout_links(LEGACY_INDEX, INDEX_URL, &selectors);
        assert_eq!(result, Err(ParseFailure::MissingElement(".swiper-container | #missing".into())));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(LinkRole::Layout.to_string(), "layout");
        assert_eq!(LinkRole::Article.to_string(), "article");
    }
}
