//! Feed entry types.

use chrono::{DateTime, Utc};

/// One item of a syndication feed, as handed over by a [`FeedSource`].
///
/// Empty strings stand for absent `guid`, `link` and `title` values so that
/// identity derivation can fall through them in order.
///
/// [`FeedSource`]: crate::feed::FeedSource
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    /// Globally unique id (RSS guid / Atom id).
    pub guid: String,
    /// Link to the original article.
    pub link: String,
    /// Entry title.
    pub title: String,
    /// Plain-text body or snippet.
    pub body: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// When the entry was published.
    pub published_at: Option<DateTime<Utc>>,
    /// Thumbnail image URL.
    pub thumbnail_url: Option<String>,
}

impl Entry {
    /// Create an entry with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the guid.
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = guid.into();
        self
    }

    /// Set the link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the publish time.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Set the thumbnail URL.
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }
}
