//! Notification payload built from a feed entry.

use chrono::{DateTime, Utc};

use crate::config::FeedConfig;
use crate::feed::Entry;

/// Maximum length of a notification body, in characters.
pub const MAX_BODY_CHARS: usize = 2000;

/// Maximum length of a notification title, in characters.
pub const MAX_TITLE_CHARS: usize = 256;

/// Maximum length of a notification author name, in characters.
pub const MAX_AUTHOR_CHARS: usize = 256;

/// Marker appended to truncated text.
const ELLIPSIS: &str = "...";

/// Title used when an entry has none.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Body used when an entry has neither summary nor content.
pub const DEFAULT_BODY: &str = "No description available.";

/// Accent color of every notification.
pub const NOTIFICATION_COLOR: u32 = 0x0099FF;

/// A formatted notification for a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Role mentioned in the message content, if any.
    pub mention_role: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub body: String,
    pub color: u32,
    /// Publish time of the entry, or the time the notification was built.
    pub timestamp: DateTime<Utc>,
    /// Feed name.
    pub footer: String,
    pub author: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl Notification {
    /// Build the notification for `entry` coming from `feed`.
    pub fn from_entry(entry: &Entry, feed: &FeedConfig, now: DateTime<Utc>) -> Self {
        let title = non_empty(&entry.title).unwrap_or(DEFAULT_TITLE);
        let body = entry
            .body
            .as_deref()
            .and_then(non_empty)
            .unwrap_or(DEFAULT_BODY);

        Self {
            mention_role: feed.audience().map(str::to_string),
            title: truncate_chars(title, MAX_TITLE_CHARS),
            url: non_empty(&entry.link).map(str::to_string),
            body: truncate_body(body),
            color: NOTIFICATION_COLOR,
            timestamp: entry.published_at.unwrap_or(now),
            footer: feed.name.clone(),
            author: entry
                .author
                .as_deref()
                .and_then(non_empty)
                .map(|author| truncate_chars(author, MAX_AUTHOR_CHARS)),
            thumbnail_url: entry
                .thumbnail_url
                .as_deref()
                .and_then(non_empty)
                .map(str::to_string),
        }
    }

    /// Message content: the role mention token, if a role is set.
    pub fn content(&self) -> Option<String> {
        self.mention_role.as_ref().map(|role| format!("<@&{}>", role))
    }
}

/// Limit `text` to [`MAX_BODY_CHARS`] characters.
pub fn truncate_body(text: &str) -> String {
    truncate_chars(text, MAX_BODY_CHARS)
}

/// Limit `text` to `max` characters.
///
/// Longer text keeps its first `max - 3` characters followed by `...`.
/// Counting is by character, so multi-byte text is never split.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

fn non_empty(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
