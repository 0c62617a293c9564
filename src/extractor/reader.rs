use readability::extractor;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::extractor::model::ExtractedText;

/// Containers that usually hold the story body, most specific first.
const CONTENT_SELECTORS: [&str; 9] = [
    "article",
    "main",
    "[role='main']",
    ".article",
    ".entry-content",
    ".post",
    ".content",
    "#content",
    "#main",
];

/// Below this many characters a container is treated as chrome, not body.
const MIN_CONTAINER_CHARS: usize = 100;

pub fn extract(html: &str, url: &Url) -> ExtractedText {
    let document = Html::parse_document(html);

    if let Ok(article) = extractor::extract(&mut html.as_bytes(), url)
        && !article.text.trim().is_empty()
    {
        let title = non_empty(article.title).or_else(|| extract_title(&document));
        return ExtractedText {
            title,
            text: article.text,
        };
    }

    ExtractedText {
        title: extract_title(&document),
        text: extract_main_content(&document),
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn extract_title(document: &Html) -> Option<String> {
    if let Ok(selector) = Selector::parse("meta[property='og:title']") {
        let og = document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .find_map(|content| non_empty(content.to_string()));
        if og.is_some() {
            return og;
        }
    }

    ["title", "h1"].iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        document
            .select(&selector)
            .find_map(|el| non_empty(element_text(el)))
    })
}

fn extract_main_content(document: &Html) -> String {
    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = paragraph_text(element);
            if text.trim().chars().count() > MIN_CONTAINER_CHARS {
                return text;
            }
        }
    }

    Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next().map(paragraph_text))
        .unwrap_or_default()
}

/// Text of `<p>`-like blocks separated by blank lines, or the raw text when
/// the container has no block children.
fn paragraph_text(container: ElementRef<'_>) -> String {
    let blocks = Selector::parse("p, h2, h3, li, blockquote")
        .map(|selector| {
            container
                .select(&selector)
                .map(element_text)
                .filter(|text| !text.trim().is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if blocks.is_empty() {
        element_text(container)
    } else {
        blocks.join("\n\n")
    }
}
