//! Feed retrieval and parsing.
//!
//! [`FeedSource`] is the boundary the scheduler depends on; [`HttpFeedSource`]
//! is the production implementation that downloads a document over HTTP and
//! parses it as RSS or Atom.

use async_trait::async_trait;
use feed_rs::model;
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{RelayError, Result};
use crate::feed::types::Entry;

/// Something that can turn a feed URL into an ordered list of entries.
///
/// Any retrieval or parse failure is reported as a single
/// [`RelayError::Fetch`]; partial entry lists are never returned.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `url`, preserving document order.
    async fn fetch(&self, url: &str) -> Result<Vec<Entry>>;
}

/// HTTP feed source backed by reqwest and feed-rs.
pub struct HttpFeedSource {
    client: Client,
    max_feed_size: u64,
}

impl HttpFeedSource {
    /// Create a new source from fetch settings.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| RelayError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_feed_size {
            return Err(RelayError::Fetch(format!(
                "feed too large: {} bytes (max {} bytes)",
                size, self.max_feed_size
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<Entry>> {
        validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::Fetch(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            self.check_size(content_length)?;
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::Fetch(format!("failed to read response: {}", e)))?;
        self.check_size(bytes.len() as u64)?;

        let entries = parse_feed(&bytes)?;
        debug!("Fetched {} entries from {}", entries.len(), url);
        Ok(entries)
    }
}

/// Check that a feed URL is an absolute http(s) URL with a host.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| RelayError::Fetch(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(RelayError::Fetch(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(RelayError::Fetch("URL has no host".to_string()));
    }

    Ok(())
}

/// Parse RSS/Atom bytes into entries in document order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<Entry>> {
    // feed-rs invents ids for entries without a guid; keep them empty so
    // identity falls through to link and title.
    let feed = parser::Builder::new()
        .id_generator(|_links, _title, _uri| String::new())
        .build()
        .parse(bytes)
        .map_err(|e| RelayError::Fetch(format!("failed to parse feed: {}", e)))?;

    Ok(feed.entries.into_iter().map(convert_entry).collect())
}

fn convert_entry(entry: model::Entry) -> Entry {
    let thumbnail_url = select_thumbnail(&entry);
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default();

    let body = entry
        .summary
        .map(|t| strip_html(&t.content))
        .filter(|s| !s.is_empty())
        .or_else(|| {
            entry
                .content
                .and_then(|c| c.body)
                .map(|b| strip_html(&b))
                .filter(|s| !s.is_empty())
        });

    Entry {
        guid: entry.id.trim().to_string(),
        link,
        title: entry.title.map(|t| t.content.trim().to_string()).unwrap_or_default(),
        body,
        author: entry
            .authors
            .first()
            .map(|a| a.name.trim().to_string())
            .filter(|n| !n.is_empty()),
        published_at: entry.published.or(entry.updated),
        thumbnail_url,
    }
}

/// Pick an image for the entry: media content, then media thumbnails,
/// then an `enclosure` link.
fn select_thumbnail(entry: &model::Entry) -> Option<String> {
    let from_content = entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(|c| c.url.as_ref().map(|u| u.as_str().to_string()))
        .find(|u| !u.is_empty());

    let from_thumbnails = || {
        entry
            .media
            .iter()
            .flat_map(|m| m.thumbnails.iter())
            .map(|t| t.image.uri.trim().to_string())
            .find(|u| !u.is_empty())
    };

    let from_links = || {
        entry
            .links
            .iter()
            .find(|l| {
                l.rel
                    .as_deref()
                    .is_some_and(|r| r.eq_ignore_ascii_case("enclosure"))
            })
            .map(|l| l.href.trim().to_string())
            .filter(|h| !h.is_empty())
    };

    from_content.or_else(from_thumbnails).or_else(from_links)
}

/// Reduce an HTML fragment to plain text.
///
/// Tags are dropped, a handful of named entities and all numeric entities
/// are decoded, and runs of whitespace collapse to a single space.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut chars = html.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '<' => {
                // Skip to the end of the tag; a tag boundary separates words.
                for c in chars.by_ref() {
                    if c == '>' {
                        break;
                    }
                }
                text.push(' ');
            }
            '&' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ';' || name.len() > 10 || c.is_whitespace() || c == '&' {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if chars.peek() == Some(&';') {
                    chars.next();
                    match decode_entity(&name) {
                        Some(decoded) => text.push(decoded),
                        None => {
                            text.push('&');
                            text.push_str(&name);
                            text.push(';');
                        }
                    }
                } else {
                    text.push('&');
                    text.push_str(&name);
                }
            }
            _ => text.push(ch),
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}
