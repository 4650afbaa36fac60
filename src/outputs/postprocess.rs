//! Structural rewrites the generic feed builder cannot express.
//!
//! Applied to the document tree before it is serialized:
//!
//! 1. `xmlns:dc` and `xmlns:media` on the root element
//! 2. one `dc:publisher` element ahead of the first entry
//! 3. per entry, `dc:creator` and `media:thumbnail` right after its `link`
//! 4. Atom only: header elements in canonical order
//!
//! Every step checks for its own output first, so running the post-processor
//! on an already processed document changes nothing. Enrichment is best
//! effort: an entry without a `link`, or whose id matches no record of the
//! window, is left as it is.

use crate::config::FeedSettings;
use crate::error::PipelineError;
use crate::models::EnrichedRecord;
use crate::outputs::feed::{FeedDocument, FeedFormat, entry_id};
use crate::outputs::xml::Element;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
pub const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";

const NAMESPACES: [(&str, &str); 2] = [("xmlns:dc", DC_NS), ("xmlns:media", MEDIA_NS)];
const PUBLISHER: &str = "dc:publisher";
const CREATOR: &str = "dc:creator";
const THUMBNAIL: &str = "media:thumbnail";
const ANCHOR: &str = "link";

/// Header slots of an Atom feed, in output order.
#[derive(Debug, Clone, Copy)]
enum AtomHeader {
    Title,
    Subtitle,
    Updated,
    AlternateLink,
    Id,
    SelfLink,
    Icon,
}

impl AtomHeader {
    const ORDER: [AtomHeader; 7] = [
        AtomHeader::Title,
        AtomHeader::Subtitle,
        AtomHeader::Updated,
        AtomHeader::AlternateLink,
        AtomHeader::Id,
        AtomHeader::SelfLink,
        AtomHeader::Icon,
    ];

    fn matches(self, el: &Element) -> bool {
        match self {
            AtomHeader::Title => el.name == "title",
            AtomHeader::Subtitle => el.name == "subtitle",
            AtomHeader::Updated => el.name == "updated",
            AtomHeader::AlternateLink => {
                el.name == "link" && matches!(el.attr("rel"), None | Some("alternate"))
            }
            AtomHeader::Id => el.name == "id",
            AtomHeader::SelfLink => el.name == "link" && el.attr("rel") == Some("self"),
            AtomHeader::Icon => el.name == "icon",
        }
    }
}

/// Apply the structural rewrites to `doc` for the records in `window`.
///
/// Fails with [`PipelineError::Serialization`] when the document is not a
/// recognisable RSS or Atom tree.
#[instrument(level = "info", skip_all, fields(format = doc.format.name(), records = window.len()))]
pub fn post_process(
    mut doc: FeedDocument,
    window: &[EnrichedRecord],
    settings: &FeedSettings,
) -> Result<FeedDocument, PipelineError> {
    let format = doc.format;
    if doc.root.name != format.root_name() {
        return Err(PipelineError::Serialization(format!(
            "expected <{}> root, found <{}>",
            format.root_name(),
            doc.root.name
        )));
    }

    for (key, uri) in NAMESPACES {
        if doc.root.set_attr_if_absent(key, uri) {
            debug!(namespace = key, "Injected namespace");
        }
    }

    let site_url = settings.site_url()?;
    let by_id: HashMap<String, &EnrichedRecord> = window
        .iter()
        .map(|r| (entry_id(&site_url, &r.fingerprint), r))
        .collect();

    let container = match format {
        FeedFormat::Rss => doc.root.child_mut("channel").ok_or_else(|| {
            PipelineError::Serialization("RSS document has no <channel>".to_string())
        })?,
        FeedFormat::Atom => &mut doc.root,
    };

    insert_publisher(container, format, &settings.publisher);

    let mut enriched = 0usize;
    for entry in container
        .children_mut()
        .iter_mut()
        .filter(|c| c.name == format.entry_name())
    {
        let Some(record) = entry
            .child(format.entry_id_name())
            .and_then(Element::text)
            .and_then(|id| by_id.get(id))
        else {
            debug!("Entry matches no archived record; leaving it as is");
            continue;
        };
        if enrich_entry(entry, record, settings) {
            enriched += 1;
        }
    }

    if format == FeedFormat::Atom {
        reorder_atom_header(container);
    }

    debug!(enriched, "Post-processed feed");
    Ok(doc)
}

fn insert_publisher(container: &mut Element, format: FeedFormat, publisher: &str) {
    if publisher.is_empty() || container.has_child(PUBLISHER) {
        return;
    }
    let children = container.children_mut();
    let at = children
        .iter()
        .position(|c| c.name == format.entry_name())
        .unwrap_or(children.len());
    children.insert(at, Element::text_node(PUBLISHER, publisher));
}

/// Returns whether anything was inserted.
fn enrich_entry(entry: &mut Element, record: &EnrichedRecord, settings: &FeedSettings) -> bool {
    let Some(anchor) = entry.position_of(ANCHOR) else {
        debug!(fingerprint = %record.fingerprint, "Entry has no link; skipping enrichment");
        return false;
    };
    let mut at = anchor + 1;
    let mut inserted = false;

    if !entry.has_child(CREATOR) {
        let author = record.display_author(&settings.default_author);
        entry.children_mut().insert(at, Element::text_node(CREATOR, author));
        inserted = true;
    }
    if let Some(pos) = entry.position_of(CREATOR) {
        at = pos + 1;
    }

    if let Some(thumbnail) = &settings.thumbnail_url {
        if !entry.has_child(THUMBNAIL) {
            entry
                .children_mut()
                .insert(at, Element::new(THUMBNAIL).with_attr("url", thumbnail));
            inserted = true;
        }
    }
    inserted
}

fn reorder_atom_header(feed: &mut Element) {
    let children = std::mem::take(feed.children_mut());
    let (entries, mut header): (Vec<Element>, Vec<Element>) =
        children.into_iter().partition(|c| c.name == "entry");

    let mut ordered = Vec::with_capacity(header.len() + entries.len());
    for slot in AtomHeader::ORDER {
        if let Some(pos) = header.iter().position(|el| slot.matches(el)) {
            ordered.push(header.remove(pos));
        }
    }
    ordered.extend(header);
    ordered.extend(entries);
    *feed.children_mut() = ordered;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{newest_first, record};
    use crate::outputs::feed::build;
    use crate::outputs::xml::to_xml_string;
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    fn processed(format: FeedFormat, window: &[EnrichedRecord]) -> FeedDocument {
        let settings = FeedSettings::default();
        let doc = build(window, format, &settings, now()).unwrap();
        post_process(doc, window, &settings).unwrap()
    }

    #[test]
    fn test_idempotent_byte_identical() {
        let settings = FeedSettings::default();
        let window = newest_first(5);
        for format in [FeedFormat::Rss, FeedFormat::Atom] {
            let once = processed(format, &window);
            let twice = post_process(once.clone(), &window, &settings).unwrap();
            assert_eq!(to_xml_string(&once.root).unwrap(), to_xml_string(&twice.root).unwrap());
        }
    }

    #[test]
    fn test_namespaces_injected_once() {
        let doc = processed(FeedFormat::Rss, &newest_first(1));
        assert_eq!(doc.root.attr("xmlns:dc"), Some(DC_NS));
        assert_eq!(doc.root.attr("xmlns:media"), Some(MEDIA_NS));
        let xml = to_xml_string(&doc.root).unwrap();
        assert_eq!(xml.matches("xmlns:dc=").count(), 1);
        assert_eq!(xml.matches("<dc:publisher>").count(), 1);
    }

    #[test]
    fn test_publisher_precedes_first_entry() {
        let doc = processed(FeedFormat::Rss, &newest_first(2));
        let channel = doc.root.child("channel").unwrap();
        let publisher = channel.position_of(PUBLISHER).unwrap();
        let first_item = channel.position_of("item").unwrap();
        assert_eq!(publisher + 1, first_item);
    }

    #[test]
    fn test_enrichment_follows_link() {
        let doc = processed(FeedFormat::Rss, &[record(7)]);
        let item = doc.root.child("channel").unwrap().child("item").unwrap();
        let names: Vec<&str> = item.children().iter().map(|c| c.name.as_str()).collect();
        let link = names.iter().position(|n| *n == "link").unwrap();
        assert_eq!(names[link + 1], CREATOR);
        assert_eq!(names[link + 2], THUMBNAIL);
        assert_eq!(item.child(CREATOR).unwrap().text(), Some("Shigesato Itoi"));
        assert_eq!(
            item.child(THUMBNAIL).unwrap().attr("url"),
            FeedSettings::default().thumbnail_url.as_deref()
        );
    }

    #[test]
    fn test_missing_anchor_skips_entry_only() {
        let settings = FeedSettings::default();
        let window = newest_first(2);
        let mut doc = build(&window, FeedFormat::Atom, &settings, now()).unwrap();
        let first = doc
            .root
            .children_mut()
            .iter_mut()
            .find(|c| c.name == "entry")
            .unwrap();
        first.children_mut().retain(|c| c.name != "link");

        let doc = post_process(doc, &window, &settings).unwrap();
        let entries: Vec<&Element> = doc.root.children().iter().filter(|c| c.name == "entry").collect();
        assert!(!entries[0].has_child(CREATOR));
        assert!(entries[1].has_child(CREATOR));
        assert!(entries[1].has_child(THUMBNAIL));
    }

    #[test]
    fn test_unknown_entry_left_untouched() {
        let settings = FeedSettings::default();
        let doc = build(&[record(1)], FeedFormat::Rss, &settings, now()).unwrap();
        let doc = post_process(doc, &[record(2)], &settings).unwrap();
        let item = doc.root.child("channel").unwrap().child("item").unwrap();
        assert!(!item.has_child(CREATOR));
    }

    #[test]
    fn test_atom_header_order() {
        let doc = processed(FeedFormat::Atom, &newest_first(1));
        let names: Vec<String> = doc
            .root
            .children()
            .iter()
            .map(|c| match c.attr("rel") {
                Some(rel) => format!("{}[{rel}]", c.name),
                None => c.name.clone(),
            })
            .collect();
        assert_eq!(
            &names[..7],
            &[
                "title",
                "subtitle",
                "updated",
                "link[alternate]",
                "id",
                "link[self]",
                "icon"
            ]
        );
        assert_eq!(names.last().map(String::as_str), Some("entry"));
        assert!(names.contains(&"author".to_string()));
        assert!(names.contains(&PUBLISHER.to_string()));
    }

    #[test]
    fn test_atom_header_absent_elements_omitted() {
        let mut settings = FeedSettings::default();
        settings.icon_url = None;
        let doc = build(&[], FeedFormat::Atom, &settings, now()).unwrap();
        let doc = post_process(doc, &[], &settings).unwrap();
        let names: Vec<&str> = doc.root.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(&names[..6], &["title", "subtitle", "updated", "link", "id", "link"]);
        assert!(!names.contains(&"icon"));
    }

    #[test]
    fn test_rss_without_channel_is_serialization_failure() {
        let doc = FeedDocument {
            format: FeedFormat::Rss,
            root: Element::new("rss"),
        };
        let err = post_process(doc, &[], &FeedSettings::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Serialization(_)));
    }

    #[test]
    fn test_wrong_root_is_serialization_failure() {
        let doc = FeedDocument {
            format: FeedFormat::Atom,
            root: Element::new("rss"),
        };
        assert!(post_process(doc, &[], &FeedSettings::default()).is_err());
    }
}
