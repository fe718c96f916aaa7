//! Article title and body extraction.
//!
//! Article pages embed decorative CSS/JS between `/* ... */` markers, some of
//! it outside `<style>` elements, so those blocks are removed from the raw
//! markup before it is parsed.

use crate::config::ArticleSelectors;
use crate::links::parse_selector;
use crate::models::Article;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, instrument, warn};

static COMMENT_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// Remove every `/* ... */` block from `markup`.
pub fn strip_comment_blocks(markup: &str) -> String {
    COMMENT_BLOCK.replace_all(markup, "").into_owned()
}

/// Extract the title and body of an article page.
///
/// Each field is looked up through the selector variants in order, so a page
/// mixing current and legacy markup still yields both. Fields with no match
/// come back empty, never as an error.
#[instrument(level = "debug", skip_all, fields(bytes = markup.len()))]
pub fn extract_article(markup: &str, variants: &[ArticleSelectors]) -> Article {
    let cleaned = strip_comment_blocks(markup);
    let document = Html::parse_document(&cleaned);

    let mut article = Article::default();
    for selectors in variants {
        if !article.title.is_empty() && !article.body.is_empty() {
            break;
        }
        let Some(found) = extract_with(&document, selectors) else {
            continue;
        };
        if article.title.is_empty() {
            article.title = found.title;
        }
        if article.body.is_empty() {
            article.body = found.body;
        }
    }

    debug!(
        title_chars = article.title.chars().count(),
        body_chars = article.body.chars().count(),
        "Extracted article"
    );
    article
}

fn extract_with(document: &Html, selectors: &ArticleSelectors) -> Option<Article> {
    let (title_sel, body_sel, paragraph_sel) = match (
        parse_selector(&selectors.title),
        parse_selector(&selectors.body),
        parse_selector(&selectors.paragraph),
    ) {
        (Ok(t), Ok(b), Ok(p)) => (t, b, p),
        (t, b, p) => {
            for e in [t.err(), b.err(), p.err()].into_iter().flatten() {
                warn!(error = %e, "Skipping article selector variant");
            }
            return None;
        }
    };

    let title = document
        .select(&title_sel)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let body = document
        .select(&body_sel)
        .map(|container| {
            let paragraphs: Vec<String> = container
                .select(&paragraph_sel)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect();
            if paragraphs.is_empty() {
                element_text(container)
            } else {
                paragraphs.join("\n")
            }
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Some(Article { title, body })
}

/// Text content of an element, one trimmed line per non-blank source line.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;

    #[test]
    fn test_strip_comment_blocks() {
        let markup = "<p>keep</p>/* .swiper { color: red; }\n.x { } */<p>also</p>";
        assert_eq!(strip_comment_blocks(markup), "<p>keep</p><p>also</p>");
    }

    #[test]
    fn test_peoples_daily_article() {
        let markup = r#"
            <html><body>
              <div class="article">
                <h3>引题</h3>
                <h1>Spring planting begins</h1>
                <h2>副题</h2>
                <div id="ozoom">
                  /* .decor { background: url(x.png); } */
                  <p>First paragraph.</p>
                  <p>  Second paragraph.  </p>
                  <p></p>
                </div>
              </div>
            </body></html>
        "#;
        let article = extract_article(markup, &SiteProfile::peoples_daily().article_selectors);
        assert_eq!(article.title, "Spring planting begins");
        assert_eq!(article.body, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn test_legacy_variant_is_used_when_current_misses() {
        let markup = r#"
            <div class="text_c">
              <h1>Legacy headline</h1>
              <div id="ozoom"><founder-content><p>Old body.</p></founder-content></div>
            </div>
        "#;
        let article = extract_article(markup, &SiteProfile::peoples_daily().article_selectors);
        assert_eq!(article.title, "Legacy headline");
        assert_eq!(article.body, "Old body.");
    }

    #[test]
    fn test_multi_level_title_joins_top_to_bottom() {
        let selectors = vec![ArticleSelectors::new(
            ".head h3, .head h1, .head h2",
            ".content",
        )];
        let markup = r#"
            <div class="head"><h3>Kicker</h3><h1>Main title</h1><h2>Subtitle</h2></div>
            <div class="content"><p>Body.</p></div>
        "#;
        let article = extract_article(markup, &selectors);
        assert_eq!(article.title, "Kicker\nMain title\nSubtitle");
    }

    #[test]
    fn test_body_without_paragraphs_uses_container_text() {
        let markup = r#"
            <div class="newsdetatit"><h3>Xinhua headline</h3></div>
            <div class="newsdetatext">
              Line one<br>
              Line two
            </div>
        "#;
        let article = extract_article(markup, &SiteProfile::xinhua_daily().article_selectors);
        assert_eq!(article.title, "Xinhua headline");
        assert_eq!(article.body, "Line one\nLine two");
    }

    #[test]
    fn test_inline_markup_stays_on_one_line() {
        let markup = r#"<div class="article"><h1>Title</h1></div>
            <div id="ozoom"><p>Hello <b>world</b>, again.</p></div>"#;
        let article = extract_article(markup, &SiteProfile::peoples_daily().article_selectors);
        assert_eq!(article.body, "Hello world, again.");
    }

    #[test]
    fn test_missing_elements_yield_empty_fields() {
        let article = extract_article(
            "<html><body><div>redirecting...</div></body></html>",
            &SiteProfile::peoples_daily().article_selectors,
        );
        assert_eq!(article, Article::default());
    }

    #[test]
    fn test_body_only_page_keeps_empty_title() {
        let markup = r#"<div id="ozoom"><p>Picture caption only.</p></div>"#;
        let article = extract_article(markup, &SiteProfile::peoples_daily().article_selectors);
        assert_eq!(article.title, "");
        assert_eq!(article.body, "Picture caption only.");
    }

    #[test]
    fn test_invalid_variant_is_skipped() {
        let variants = vec![
            ArticleSelectors::new("h1[", ".body"),
            ArticleSelectors::new("h1", ".body"),
        ];
        let article = extract_article("<h1>T</h1><div class=\"body\"><p>B</p></div>", &variants);
        assert_eq!(article.title, "T");
        assert_eq!(article.body, "B");
    }
}
