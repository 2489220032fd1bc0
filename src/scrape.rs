//! Link extraction
//!
//! Finds the file links on the listing page: every element matched by a
//! configured CSS selector (by default `a[rel="noopener noreferrer"]`)
//! contributes its `href`.

use reqwest::Url;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

/// Link extraction error types
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Invalid link selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Extracts file links from the listing page
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    selector: Selector,
}

impl LinkExtractor {
    /// Build an extractor for elements matching the CSS `selector`
    pub fn new(selector: &str) -> Result<Self, ScrapeError> {
        let parsed = Selector::parse(selector).map_err(|e| ScrapeError::InvalidSelector {
            selector: selector.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { selector: parsed })
    }

    /// Extract absolute link URLs from `html`
    ///
    /// Relative links are resolved against `base_url`, the URL the page was
    /// served from. Links are returned in document order, duplicates removed.
    pub fn extract(&self, html: &str, base_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let base = Url::parse(base_url).ok();
        let mut links: Vec<String> = Vec::new();

        for element in document.select(&self.selector) {
            let Some(href) = element.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') {
                continue;
            }

            let absolute = match (&base, Url::parse(href)) {
                (_, Ok(url)) => url.to_string(),
                (Some(base), Err(_)) => match base.join(href) {
                    Ok(url) => url.to_string(),
                    Err(e) => {
                        warn!(href = %href, error = %e, "Skipping unresolvable link");
                        continue;
                    }
                },
                (None, Err(_)) => href.to_string(),
            };

            if !links.contains(&absolute) {
                debug!(url = %absolute, "Found link");
                links.push(absolute);
            }
        }

        info!(count = links.len(), "Found links");
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTOR: &str = r#"a[rel="noopener noreferrer"]"#;
    const BASE: &str = "https://abc.de/choere/gmc/?ppwp=1";

    fn extract_links(html: &str, selector: &str) -> Vec<String> {
        LinkExtractor::new(selector).unwrap().extract(html, BASE)
    }

    #[test]
    fn test_extracts_matching_anchors() {
        let html = r#"
            <p><a href="https://abc.de/files/one.pdf" target="_blank" rel="noopener noreferrer">One</a></p>
            <a href="https://abc.de/about">About</a>
            <a rel="noopener noreferrer" href='https://abc.de/files/two.pdf'>Two</a>
        "#;

        assert_eq!(
            extract_links(html, SELECTOR),
            vec![
                "https://abc.de/files/one.pdf".to_string(),
                "https://abc.de/files/two.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_relative_links_resolved() {
        let html = r#"<a rel="noopener noreferrer" href="/files/three.pdf">3</a>"#;
        assert_eq!(
            extract_links(html, SELECTOR),
            vec!["https://abc.de/files/three.pdf".to_string()]
        );
    }

    #[test]
    fn test_duplicates_and_fragments_skipped() {
        let html = r##"
            <a rel="noopener noreferrer" href="https://abc.de/a.pdf">a</a>
            <a rel="noopener noreferrer" href="https://abc.de/a.pdf">again</a>
            <a rel="noopener noreferrer" href="#top">top</a>
            <a rel="noopener noreferrer">no href</a>
        "##;
        assert_eq!(
            extract_links(html, SELECTOR),
            vec!["https://abc.de/a.pdf".to_string()]
        );
    }

    #[test]
    fn test_data_href_is_not_the_link() {
        let html = r#"<a data-href="/tracking" href="/files/real.pdf" rel="noopener noreferrer">x</a>"#;
        assert_eq!(
            extract_links(html, SELECTOR),
            vec!["https://abc.de/files/real.pdf".to_string()]
        );
    }

    #[test]
    fn test_angle_bracket_inside_attribute() {
        let html = r#"<a title="a > b" href="/files/report.pdf" rel="noopener noreferrer">x</a>"#;
        assert_eq!(
            extract_links(html, SELECTOR),
            vec!["https://abc.de/files/report.pdf".to_string()]
        );
    }

    #[test]
    fn test_single_quoted_rel() {
        let html = "<a href=\"/files/quoted.pdf\" rel='noopener noreferrer'>x</a>";
        assert_eq!(
            extract_links(html, SELECTOR),
            vec!["https://abc.de/files/quoted.pdf".to_string()]
        );
    }

    #[test]
    fn test_entities_decoded() {
        let html = "<A\n  HREF=\"https://abc.de/get?id=1&amp;v=2\"\n  rel=\"noopener noreferrer\">x</A>";
        assert_eq!(
            extract_links(html, SELECTOR),
            vec!["https://abc.de/get?id=1&v=2".to_string()]
        );
    }

    #[test]
    fn test_custom_selector() {
        let html = r#"
            <ul class="downloads"><li><a href="/files/a.pdf">a</a></li></ul>
            <a href="/files/other.pdf" rel="noopener noreferrer">other</a>
        "#;
        assert_eq!(
            extract_links(html, "ul.downloads a"),
            vec!["https://abc.de/files/a.pdf".to_string()]
        );
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(
            LinkExtractor::new("a[rel="),
            Err(ScrapeError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_no_links() {
        assert!(extract_links("<html><body>nothing</body></html>", SELECTOR).is_empty());
    }
}
