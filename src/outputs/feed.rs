//! Generic RSS 2.0 and Atom 1.0 documents built from the archive window.
//!
//! The output here is what any feed library would produce: standard
//! elements only, in the usual serializer order. Namespaced enrichment and
//! header ordering are applied afterwards by [`super::postprocess`].

use crate::config::FeedSettings;
use crate::error::PipelineError;
use crate::models::EnrichedRecord;
use crate::outputs::xml::Element;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use url::Url;

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    Rss,
    Atom,
}

impl FeedFormat {
    pub fn name(self) -> &'static str {
        match self {
            FeedFormat::Rss => "rss",
            FeedFormat::Atom => "atom",
        }
    }

    /// Root element of a well-formed document in this format.
    pub fn root_name(self) -> &'static str {
        match self {
            FeedFormat::Rss => "rss",
            FeedFormat::Atom => "feed",
        }
    }

    pub fn entry_name(self) -> &'static str {
        match self {
            FeedFormat::Rss => "item",
            FeedFormat::Atom => "entry",
        }
    }

    pub fn entry_id_name(self) -> &'static str {
        match self {
            FeedFormat::Rss => "guid",
            FeedFormat::Atom => "id",
        }
    }
}

/// A feed document tree together with its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub format: FeedFormat,
    pub root: Element,
}

/// One rendered entry, independent of the output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub author: String,
    pub link: String,
    pub summary: String,
    pub content_html: String,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Stable entry identifier: the site URL with the fingerprint as fragment.
pub fn entry_id(site_url: &Url, fingerprint: &str) -> String {
    let mut url = site_url.clone();
    url.set_fragment(Some(fingerprint));
    url.to_string()
}

/// Paragraphs separated by blank lines, as escaped HTML `<p>` elements.
pub fn paragraphs_html(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

impl FeedEntry {
    pub fn from_record(record: &EnrichedRecord, settings: &FeedSettings, site_url: &Url) -> Self {
        Self {
            id: entry_id(site_url, &record.fingerprint),
            title: record.display_title().to_string(),
            author: record.display_author(&settings.default_author).to_string(),
            link: settings.entry_link.clone(),
            summary: record.display_summary().to_string(),
            content_html: paragraphs_html(&record.display_body()),
            published: record.created_at,
            updated: record.created_at,
        }
    }
}

/// Render `window` (newest first) as a generic document in `format`.
///
/// `generated_at` only matters for an empty window, where it stands in for
/// the feed's last-update time.
pub fn build(
    window: &[EnrichedRecord],
    format: FeedFormat,
    settings: &FeedSettings,
    generated_at: DateTime<Utc>,
) -> Result<FeedDocument, PipelineError> {
    let site_url = settings.site_url()?;
    let self_url = settings.self_url(format)?;
    let entries: Vec<FeedEntry> = window
        .iter()
        .map(|r| FeedEntry::from_record(r, settings, &site_url))
        .collect();
    let updated = entries.first().map_or(generated_at, |e| e.updated);

    let root = match format {
        FeedFormat::Rss => rss(&entries, settings, &site_url, &self_url, updated),
        FeedFormat::Atom => atom(&entries, settings, &site_url, &self_url, updated),
    };
    Ok(FeedDocument { format, root })
}

fn rss(
    entries: &[FeedEntry],
    settings: &FeedSettings,
    site_url: &Url,
    self_url: &Url,
    updated: DateTime<Utc>,
) -> Element {
    let mut channel = Element::new("channel")
        .with_child(Element::text_node("title", &settings.title))
        .with_child(Element::text_node("link", site_url.as_str()))
        .with_child(Element::text_node("description", &settings.subtitle))
        .with_child(
            Element::new("atom:link")
                .with_attr("href", self_url.as_str())
                .with_attr("rel", "self")
                .with_attr("type", "application/rss+xml"),
        )
        .with_child(Element::text_node("docs", "http://www.rssboard.org/rss-specification"))
        .with_child(Element::text_node("generator", env!("CARGO_PKG_NAME")));
    if let Some(icon) = &settings.icon_url {
        channel = channel.with_child(
            Element::new("image")
                .with_child(Element::text_node("url", icon))
                .with_child(Element::text_node("title", &settings.title))
                .with_child(Element::text_node("link", site_url.as_str())),
        );
    }
    channel = channel
        .with_child(Element::text_node("language", &settings.language))
        .with_child(Element::text_node("lastBuildDate", updated.to_rfc2822()));

    // RSS <author> must be an e-mail address; attribution is added as dc:creator later.
    for entry in entries {
        channel = channel.with_child(
            Element::new("item")
                .with_child(Element::text_node("title", &entry.title))
                .with_child(Element::text_node("link", &entry.link))
                .with_child(Element::text_node("description", &entry.summary))
                .with_child(Element::text_node("content:encoded", &entry.content_html))
                .with_child(
                    Element::text_node("guid", &entry.id).with_attr("isPermaLink", "false"),
                )
                .with_child(Element::text_node("pubDate", entry.published.to_rfc2822())),
        );
    }

    Element::new("rss")
        .with_attr("xmlns:atom", ATOM_NS)
        .with_attr("xmlns:content", CONTENT_NS)
        .with_attr("version", "2.0")
        .with_child(channel)
}

fn atom_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn atom(
    entries: &[FeedEntry],
    settings: &FeedSettings,
    site_url: &Url,
    self_url: &Url,
    updated: DateTime<Utc>,
) -> Element {
    let mut feed = Element::new("feed")
        .with_attr("xmlns", ATOM_NS)
        .with_attr("xml:lang", &settings.language)
        .with_child(Element::text_node("id", site_url.as_str()))
        .with_child(Element::text_node("title", &settings.title))
        .with_child(Element::text_node("updated", atom_time(updated)))
        .with_child(
            Element::new("author")
                .with_child(Element::text_node("name", &settings.default_author)),
        )
        .with_child(
            Element::new("link")
                .with_attr("href", site_url.as_str())
                .with_attr("rel", "alternate"),
        )
        .with_child(
            Element::new("link")
                .with_attr("href", self_url.as_str())
                .with_attr("rel", "self"),
        )
        .with_child(Element::text_node("generator", env!("CARGO_PKG_NAME")));
    if let Some(icon) = &settings.icon_url {
        feed = feed.with_child(Element::text_node("icon", icon));
    }
    feed = feed.with_child(Element::text_node("subtitle", &settings.subtitle));

    for entry in entries {
        feed = feed.with_child(
            Element::new("entry")
                .with_child(Element::text_node("id", &entry.id))
                .with_child(Element::text_node("title", &entry.title))
                .with_child(Element::text_node("updated", atom_time(entry.updated)))
                .with_child(
                    Element::new("author").with_child(Element::text_node("name", &entry.author)),
                )
                .with_child(
                    Element::text_node("content", &entry.content_html).with_attr("type", "html"),
                )
                .with_child(
                    Element::new("link")
                        .with_attr("href", &entry.link)
                        .with_attr("rel", "alternate"),
                )
                .with_child(Element::text_node("summary", &entry.summary))
                .with_child(Element::text_node("published", atom_time(entry.published))),
        );
    }
    feed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Archive;
    use crate::fixtures::{newest_first, record};

    fn now() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    fn entry_ids(doc: &FeedDocument) -> Vec<String> {
        let container = match doc.format {
            FeedFormat::Rss => doc.root.child("channel").unwrap(),
            FeedFormat::Atom => &doc.root,
        };
        container
            .children()
            .iter()
            .filter(|c| c.name == doc.format.entry_name())
            .map(|e| e.child(doc.format.entry_id_name()).unwrap().text().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_window_of_45_renders_30_newest() {
        let settings = FeedSettings::default();
        let archive = Archive::from_records(newest_first(45)).unwrap();
        let site = settings.site_url().unwrap();
        for format in [FeedFormat::Rss, FeedFormat::Atom] {
            let doc = build(archive.window(settings.window), format, &settings, now()).unwrap();
            let ids = entry_ids(&doc);
            assert_eq!(ids.len(), 30);
            let expected: Vec<String> = (15..45)
                .rev()
                .map(|i| entry_id(&site, &record(i).fingerprint))
                .collect();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn test_entry_id_uses_fingerprint_fragment() {
        let site = Url::parse("https://adtheriault.github.io/itoi-daily/").unwrap();
        assert_eq!(
            entry_id(&site, "abcdef012345"),
            "https://adtheriault.github.io/itoi-daily/#abcdef012345"
        );
    }

    #[test]
    fn test_entry_fallbacks() {
        let settings = FeedSettings::default();
        let site = settings.site_url().unwrap();
        let mut r = record(1);
        r.translated_title = None;
        r.translated_author = None;
        r.author = String::new();
        r.translated_body = None;
        r.summary = None;
        let entry = FeedEntry::from_record(&r, &settings, &site);
        assert_eq!(entry.title, "今日のダーリン 1");
        assert_eq!(entry.author, "Shigesato Itoi");
        assert_eq!(entry.summary, "");
        assert_eq!(entry.content_html, "<p>第1段落。</p>\n<p>「引用」と絵文字 🍵</p>");
        assert_eq!(entry.published, entry.updated);
    }

    #[test]
    fn test_paragraphs_html_escapes() {
        assert_eq!(
            paragraphs_html("A < B\n\n\n\nC & D"),
            "<p>A &lt; B</p>\n<p>C &amp; D</p>"
        );
    }

    #[test]
    fn test_rss_item_fields() {
        let settings = FeedSettings::default();
        let doc = build(&[record(2)], FeedFormat::Rss, &settings, now()).unwrap();
        let channel = doc.root.child("channel").unwrap();
        let item = channel.child("item").unwrap();
        assert_eq!(item.child("title").unwrap().text(), Some("Today's Darling 2"));
        assert_eq!(item.child("link").unwrap().text(), Some("https://www.1101.com/"));
        assert_eq!(item.child("description").unwrap().text(), Some("Summary 2"));
        assert_eq!(
            item.child("pubDate").unwrap().text(),
            Some(record(2).created_at.to_rfc2822().as_str())
        );
        assert_eq!(
            channel.child("lastBuildDate").unwrap().text(),
            Some(record(2).created_at.to_rfc2822().as_str())
        );
        assert_eq!(channel.child("language").unwrap().text(), Some("en"));
    }

    #[test]
    fn test_atom_entry_timestamps_match() {
        let settings = FeedSettings::default();
        let doc = build(&[record(3)], FeedFormat::Atom, &settings, now()).unwrap();
        let entry = doc.root.child("entry").unwrap();
        assert_eq!(
            entry.child("published").unwrap().text(),
            entry.child("updated").unwrap().text()
        );
        assert_eq!(
            entry.child("author").unwrap().child("name").unwrap().text(),
            Some("Shigesato Itoi")
        );
        assert_eq!(doc.root.attr("xml:lang"), Some("en"));
    }

    #[test]
    fn test_empty_window_uses_generation_time() {
        let settings = FeedSettings::default();
        let doc = build(&[], FeedFormat::Atom, &settings, now()).unwrap();
        assert_eq!(doc.root.child("updated").unwrap().text(), Some("2026-01-01T00:00:00Z"));
        assert!(!doc.root.has_child("entry"));
    }
}
