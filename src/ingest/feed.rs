// src/ingest/feed.rs
//! RSS 2.0, RSS 1.0 (RDF) and Atom parsing into [`RawArticle`]s.

use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use url::Url;

use crate::error::FetchFailure;
use crate::ingest::normalize_text;
use crate::ingest::types::{FeedSource, RawArticle};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

/// RSS 1.0 keeps items next to the channel instead of inside it.
#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

/// Element names are matched without their prefix, so `atom:link` or
/// `media:title` land in the same lists as the plain RSS children.
#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(rename = "title", default)]
    titles: Vec<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
    #[serde(rename = "description", default)]
    descriptions: Vec<TextNode>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    content_encoded: Option<String>,
}

impl RssItem {
    /// First text-bearing `<link>`, else the first `href` (an `atom:link` alone).
    fn link(&self) -> Option<&str> {
        self.links
            .iter()
            .map(|l| l.value.trim())
            .find(|v| !v.is_empty())
            .or_else(|| {
                self.links
                    .iter()
                    .map(|l| l.href.trim())
                    .find(|h| !h.is_empty())
            })
    }
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}

/// Direct text of an element. Markup children are not captured, so Atom
/// `type="xhtml"` content reads as empty and the entry falls back to its summary.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
    #[serde(rename = "@href", default)]
    href: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Rdf,
    Atom,
}

/// Decide the format from the root element.
pub fn detect_format(xml: &str) -> Option<FeedFormat> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                return match name.as_str() {
                    "rss" => Some(FeedFormat::Rss),
                    "rdf" => Some(FeedFormat::Rdf),
                    "feed" => Some(FeedFormat::Atom),
                    _ => None,
                };
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Parse a feed body. Entries without a title are skipped; a missing or
/// unparseable date falls back to `fallback_time`.
pub fn parse_feed(
    body: &str,
    source: &FeedSource,
    fallback_time: DateTime<Utc>,
) -> Result<Vec<RawArticle>, FetchFailure> {
    let t0 = std::time::Instant::now();
    let xml = scrub_html_entities_for_xml(body.trim_start_matches('\u{feff}'));
    let format = detect_format(&xml)
        .ok_or_else(|| FetchFailure::Parse("unrecognized root element".to_string()))?;

    let articles = match format {
        FeedFormat::Rss => {
            let rss: Rss = from_str(&xml).map_err(|e| FetchFailure::Parse(e.to_string()))?;
            rss_items(rss.channel.items, source, fallback_time)
        }
        FeedFormat::Rdf => {
            let rdf: Rdf = from_str(&xml).map_err(|e| FetchFailure::Parse(e.to_string()))?;
            rss_items(rdf.items, source, fallback_time)
        }
        FeedFormat::Atom => {
            let feed: AtomFeed = from_str(&xml).map_err(|e| FetchFailure::Parse(e.to_string()))?;
            atom_entries(feed.entries, source, fallback_time)
        }
    };

    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(articles)
}

fn rss_items(
    items: Vec<RssItem>,
    source: &FeedSource,
    fallback_time: DateTime<Utc>,
) -> Vec<RawArticle> {
    items
        .into_iter()
        .filter_map(|it| {
            let title = it
                .titles
                .iter()
                .map(|t| normalize_text(&t.value))
                .find(|t| !t.is_empty())?;
            let published_at = [it.pub_date.as_deref(), it.dc_date.as_deref()]
                .into_iter()
                .flatten()
                .find_map(parse_date)
                .unwrap_or(fallback_time);
            let content = first_text(
                std::iter::once(it.content_encoded.as_deref())
                    .chain(it.descriptions.iter().map(|d| Some(d.value.as_str()))),
            );
            Some(RawArticle {
                title,
                url: it.link().and_then(|l| resolve_link(l, &source.url)),
                published_at,
                source: source.clone(),
                content,
            })
        })
        .collect()
}

fn atom_entries(
    entries: Vec<AtomEntry>,
    source: &FeedSource,
    fallback_time: DateTime<Utc>,
) -> Vec<RawArticle> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let title = normalize_text(&entry.title.as_ref()?.value);
            if title.is_empty() {
                return None;
            }
            let link = entry
                .links
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .or_else(|| entry.links.first())
                .and_then(|l| resolve_link(&l.href, &source.url));
            let published_at = [entry.published.as_deref(), entry.updated.as_deref()]
                .into_iter()
                .flatten()
                .find_map(parse_date)
                .unwrap_or(fallback_time);
            let content = first_text([
                entry.content.as_ref().map(|c| c.value.as_str()),
                entry.summary.as_ref().map(|s| s.value.as_str()),
            ]);
            Some(RawArticle {
                title,
                url: link,
                published_at,
                source: source.clone(),
                content,
            })
        })
        .collect()
}

fn first_text<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(normalize_text)
        .find(|t| !t.is_empty())
}

/// RFC 2822 (RSS), RFC 3339 (Atom, dc:date), then a bare `YYYY-MM-DD HH:MM:SS` as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    OffsetDateTime::parse(s, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
}

/// Absolute links pass through; relative ones are joined onto the feed URL.
pub fn resolve_link(link: &str, feed_url: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    if link.starts_with("http://") || link.starts_with("https://") {
        return Some(link.to_string());
    }
    Url::parse(feed_url)
        .ok()?
        .join(link)
        .ok()
        .map(String::from)
}

/// quick-xml only knows the five XML entities; map the common HTML ones first.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Language;
    use chrono::TimeZone;

    fn source() -> FeedSource {
        FeedSource::new("https://blog.example.com/feed.xml", "海外", Language::En, "Example")
    }

    #[test]
    fn detects_root_elements() {
        assert_eq!(detect_format("<?xml version=\"1.0\"?><rss version=\"2.0\"/>"), Some(FeedFormat::Rss));
        assert_eq!(
            detect_format("<feed xmlns=\"http://www.w3.org/2005/Atom\"></feed>"),
            Some(FeedFormat::Atom)
        );
        assert_eq!(
            detect_format("<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\"></rdf:RDF>"),
            Some(FeedFormat::Rdf)
        );
        assert_eq!(detect_format("<html><body/></html>"), None);
        assert_eq!(detect_format("not xml at all"), None);
    }

    #[test]
    fn dates_in_both_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_date("Thu, 02 Jan 2025 03:04:05 +0000"), Some(expected));
        assert_eq!(parse_date("2025-01-02T12:04:05+09:00"), Some(expected));
        assert_eq!(parse_date("2025-01-02 03:04:05"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn relative_links_join_feed_origin() {
        assert_eq!(
            resolve_link("/posts/1", "https://blog.example.com/feed.xml").as_deref(),
            Some("https://blog.example.com/posts/1")
        );
        assert_eq!(
            resolve_link("https://other.example/x", "https://blog.example.com/feed.xml").as_deref(),
            Some("https://other.example/x")
        );
        assert_eq!(resolve_link("  ", "https://blog.example.com/"), None);
    }

    #[test]
    fn rss_item_without_title_is_skipped() {
        let xml = r#"<rss version="2.0"><channel><title>c</title>
            <item><link>https://a.example/1</link></item>
            <item><title>Kept</title><link>https://a.example/2</link><description>&lt;p&gt;Body&lt;/p&gt;</description></item>
            </channel></rss>"#;
        let run = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let out = parse_feed(xml, &source(), run).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Kept");
        assert_eq!(out[0].content.as_deref(), Some("Body"));
        assert_eq!(out[0].published_at, run);
    }

    #[test]
    fn namespaced_link_does_not_sink_the_feed() {
        let xml = r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"><channel>
            <atom:link href="https://blog.example.com/feed.xml" rel="self" type="application/rss+xml"/>
            <item><title>One</title><link>https://a.example/1</link></item>
            <item><title>Two</title><link>https://a.example/2</link></item>
            <item><title>Three</title><link>https://a.example/3</link>
              <atom:link href="https://a.example/3/amp" rel="amphtml"/></item>
            <item><title>Four</title><atom:link href="/posts/4"/></item>
            </channel></rss>"#;
        let out = parse_feed(xml, &source(), Utc::now()).unwrap();
        let urls: Vec<_> = out.iter().map(|a| a.url.as_deref()).collect();
        assert_eq!(
            urls,
            vec![
                Some("https://a.example/1"),
                Some("https://a.example/2"),
                Some("https://a.example/3"),
                Some("https://blog.example.com/posts/4"),
            ]
        );
    }

    #[test]
    fn xhtml_content_falls_back_to_summary() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <entry><title>Rich</title><link href="https://a.example/r"/>
              <updated>2025-03-01T10:00:00Z</updated>
              <summary>Plain summary</summary>
              <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Hello</p></div></content>
            </entry></feed>"#;
        let out = parse_feed(xml, &source(), Utc::now()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content.as_deref(), Some("Plain summary"));
    }

    #[test]
    fn garbage_is_a_parse_failure() {
        let err = parse_feed("<html><p>nope</p></html>", &source(), Utc::now()).unwrap_err();
        assert!(matches!(err, FetchFailure::Parse(_)));
    }
}
