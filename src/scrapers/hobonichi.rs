//! Extraction strategies for the 1101.com (Hobo Nikkan Itoi Shinbun) front page.
//!
//! The daily column "今日のダーリン" has no stable markup contract, so each
//! strategy is a pure function from the parsed document to a possibly
//! partial [`CandidateRecord`]. Ordering and acceptance are decided by
//! [`super::Extractor::extract`].

use super::Extractor;
use crate::models::CandidateRecord;
use crate::utils::is_kana;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

static CONTAINERS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div, section, article").expect("static selector"));
static HEADINGS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3").expect("static selector"));

const PARAGRAPH_SEPARATOR: &str = "\n\n";

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Texts of the non-empty paragraph elements below `container`.
fn paragraph_texts(container: ElementRef<'_>, paragraph: &Selector) -> Vec<String> {
    container
        .select(paragraph)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Known title, author and body markers.
///
/// The body container's paragraphs are joined with a blank line; a
/// container without paragraphs contributes its whole text. When no title
/// element exists, the title is read from the templating expression held in
/// the configured attribute (e.g. `x-data="{ title: '…' }"`).
pub fn targeted(extractor: &Extractor, document: &Html) -> CandidateRecord {
    let title = first_text(document, &extractor.title).or_else(|| template_title(extractor, document));
    let author = first_text(document, &extractor.author);

    let body = document.select(&extractor.body).next().and_then(|container| {
        let paragraphs = paragraph_texts(container, &extractor.paragraph);
        let text = if paragraphs.is_empty() {
            element_text(container)
        } else {
            paragraphs.join(PARAGRAPH_SEPARATOR)
        };
        (!text.is_empty()).then_some(text)
    });

    CandidateRecord { title, author, body }
}

fn template_title(extractor: &Extractor, document: &Html) -> Option<String> {
    document
        .select(&extractor.template_holder)
        .filter_map(|el| el.value().attr(&extractor.template_attribute))
        .find_map(|expr| {
            let caps = extractor.template_title.captures(expr)?;
            let value = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
            (!value.is_empty()).then(|| value.to_string())
        })
        .inspect(|title| debug!(%title, "Title read from template attribute"))
}

/// The first structural container, in document order, whose text mentions
/// the author marker, exceeds the size threshold and holds paragraphs.
///
/// The title is the container's first h1–h3, if any.
pub fn section(extractor: &Extractor, document: &Html) -> CandidateRecord {
    let config = &extractor.config;
    for container in document.select(&CONTAINERS) {
        let text = container.text().collect::<String>();
        if !text.contains(&config.author_marker) || text.chars().count() <= config.section_min_chars {
            continue;
        }
        let paragraphs = paragraph_texts(container, &extractor.paragraph);
        if paragraphs.is_empty() {
            continue;
        }
        let title = container
            .select(&HEADINGS)
            .map(element_text)
            .find(|t| !t.is_empty());
        debug!(
            element = container.value().name(),
            paragraphs = paragraphs.len(),
            "Found section mentioning author"
        );
        return CandidateRecord {
            title,
            author: None,
            body: Some(paragraphs.join(PARAGRAPH_SEPARATOR)),
        };
    }
    CandidateRecord::default()
}

/// Kana-bearing paragraphs from the main content area.
///
/// Containers are tried in configured order; only the first one present is
/// used. At most `max_fallback_paragraphs` paragraphs are kept.
pub fn main_content(extractor: &Extractor, document: &Html) -> CandidateRecord {
    let Some(main) = extractor
        .main
        .iter()
        .find_map(|sel| document.select(sel).next())
    else {
        return CandidateRecord::default();
    };

    let paragraphs: Vec<String> = paragraph_texts(main, &extractor.paragraph)
        .into_iter()
        .filter(|p| p.chars().any(is_kana))
        .take(extractor.config.max_fallback_paragraphs)
        .collect();

    CandidateRecord {
        title: None,
        author: None,
        body: (!paragraphs.is_empty()).then(|| paragraphs.join(PARAGRAPH_SEPARATOR)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractConfig;

    fn extractor() -> Extractor {
        Extractor::new(&ExtractConfig::default()).unwrap()
    }

    #[test]
    fn test_targeted_joins_paragraphs() {
        let doc = Html::parse_document(
            r#"<div class="darling-title"> 夏の終わり </div>
               <div class="darling-author">糸井重里</div>
               <div class="darling-body"><p>一段落目。</p><p> </p><p>二段落目。</p></div>"#,
        );
        let c = targeted(&extractor(), &doc);
        assert_eq!(c.title.as_deref(), Some("夏の終わり"));
        assert_eq!(c.author.as_deref(), Some("糸井重里"));
        assert_eq!(c.body.as_deref(), Some("一段落目。\n\n二段落目。"));
    }

    #[test]
    fn test_targeted_title_from_template_attribute() {
        let doc = Html::parse_document(
            r#"<div x-data="{ open: false, title: 'ダーリンの話' }"></div>
               <div class="darling-body">本文です。</div>"#,
        );
        let c = targeted(&extractor(), &doc);
        assert_eq!(c.title.as_deref(), Some("ダーリンの話"));
        assert_eq!(c.body.as_deref(), Some("本文です。"));
    }

    #[test]
    fn test_template_attribute_with_json_quotes() {
        let doc = Html::parse_document(r#"<div x-data='{"title": "雨の日"}'></div>"#);
        let c = targeted(&extractor(), &doc);
        assert_eq!(c.title.as_deref(), Some("雨の日"));
        assert!(c.body.is_none());
    }

    #[test]
    fn test_section_requires_marker_and_size() {
        let small = Html::parse_document("<div><p>糸井重里</p></div>");
        assert_eq!(section(&extractor(), &small), CandidateRecord::default());

        let long_without_marker =
            Html::parse_document(&format!("<div><p>{}</p></div>", "お".repeat(600)));
        assert_eq!(section(&extractor(), &long_without_marker), CandidateRecord::default());
    }

    #[test]
    fn test_main_content_keeps_kana_paragraphs() {
        let doc = Html::parse_document(
            r#"<main><p>English only</p><p>ひらがな</p><p>漢字</p><p>カタカナ</p></main>"#,
        );
        let c = main_content(&extractor(), &doc);
        assert_eq!(c.body.as_deref(), Some("ひらがな\n\nカタカナ"));
    }

    #[test]
    fn test_main_content_caps_paragraphs() {
        let paragraphs = "<p>あ</p>".repeat(30);
        let doc = Html::parse_document(&format!(r#"<div id="main">{paragraphs}</div>"#));
        let c = main_content(&extractor(), &doc);
        assert_eq!(c.body.unwrap().split("\n\n").count(), 20);
    }
}
